//! Recurrence rule domain model.
//!
//! # Responsibility
//! - Parse and validate fixed-interval recurrence rules.
//! - Provide calendar arithmetic for advancing by one rule interval.
//! - Reproduce the compact interval form (`<amount><unit>`) for persistence.
//!
//! # Invariants
//! - `Interval::amount` is always positive.
//! - A rule is bounded either by a positive occurrence count or by an
//!   inclusive end date, never both.
//! - Serialized `times == 0` means "bounded by end date".

use super::event::EventId;
use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static INTERVAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?[0-9]+)([A-Za-z])$").expect("valid interval regex"));

/// Date format used for recurrence end dates in persisted rows.
pub const END_DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation error raised while building a recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    /// Interval text is not `<integer><unit>`.
    InvalidInterval(String),
    /// Interval amount is zero or negative.
    NonPositiveAmount(i64),
    /// Interval unit code is not one of `d|w|m|y`.
    UnknownUnit(char),
    /// Repetition count is negative.
    NegativeTimes(i64),
    /// Repetition count is larger than the supported maximum.
    TimesOutOfRange(i64),
    /// `times == 0` but the end date is missing or not `YYYY-MM-DD`.
    InvalidEndDate(String),
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInterval(value) => write!(
                f,
                "invalid recurrence interval `{value}`; expected amount followed by d|w|m|y"
            ),
            Self::NonPositiveAmount(amount) => {
                write!(f, "recurrence interval amount must be positive, got {amount}")
            }
            Self::UnknownUnit(code) => {
                write!(f, "unknown recurrence unit `{code}`; expected d|w|m|y")
            }
            Self::NegativeTimes(times) => {
                write!(f, "recurrence times must not be negative, got {times}")
            }
            Self::TimesOutOfRange(times) => {
                write!(f, "recurrence times {times} exceeds the maximum of {}", u32::MAX)
            }
            Self::InvalidEndDate(value) => write!(
                f,
                "recurrence end date `{value}` is invalid; expected YYYY-MM-DD when times is 0"
            ),
        }
    }
}

impl Error for RecurrenceError {}

/// Calendar unit a rule advances by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    /// One-character code used in the compact interval form.
    pub fn code(self) -> char {
        match self {
            Self::Day => 'd',
            Self::Week => 'w',
            Self::Month => 'm',
            Self::Year => 'y',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'd' => Some(Self::Day),
            'w' => Some(Self::Week),
            'm' => Some(Self::Month),
            'y' => Some(Self::Year),
            _ => None,
        }
    }
}

/// Positive amount of one calendar unit, e.g. `2w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    amount: u32,
    unit: IntervalUnit,
}

impl Interval {
    pub fn new(amount: u32, unit: IntervalUnit) -> Result<Self, RecurrenceError> {
        if amount == 0 {
            return Err(RecurrenceError::NonPositiveAmount(0));
        }
        Ok(Self { amount, unit })
    }

    /// Parses the compact `<amount><unit>` form, e.g. `1d`, `2w`, `3m`, `1y`.
    pub fn parse(spec: &str) -> Result<Self, RecurrenceError> {
        let trimmed = spec.trim();
        let captures = INTERVAL_RE
            .captures(trimmed)
            .ok_or_else(|| RecurrenceError::InvalidInterval(trimmed.to_string()))?;

        let amount: i64 = captures[1]
            .parse()
            .map_err(|_| RecurrenceError::InvalidInterval(trimmed.to_string()))?;
        if amount <= 0 {
            return Err(RecurrenceError::NonPositiveAmount(amount));
        }
        let amount = u32::try_from(amount)
            .map_err(|_| RecurrenceError::InvalidInterval(trimmed.to_string()))?;

        let code = captures[2].chars().next().unwrap_or_default();
        let unit = IntervalUnit::from_code(code).ok_or(RecurrenceError::UnknownUnit(code))?;

        Ok(Self { amount, unit })
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Returns `origin` advanced by `steps` whole intervals.
    ///
    /// Month and year steps are computed from `origin` in one jump, so the
    /// original day-of-month is kept and clamped to the last day of shorter
    /// months (Jan 31 + 1m = Feb 29 in 2024, + 2m = Mar 31).
    ///
    /// Returns `None` when the result is outside the representable range.
    pub fn shift(&self, origin: NaiveDateTime, steps: u32) -> Option<NaiveDateTime> {
        let total = u64::from(self.amount).checked_mul(u64::from(steps))?;
        match self.unit {
            IntervalUnit::Day => origin.checked_add_days(Days::new(total)),
            IntervalUnit::Week => origin.checked_add_days(Days::new(total.checked_mul(7)?)),
            IntervalUnit::Month => {
                origin.checked_add_months(Months::new(u32::try_from(total).ok()?))
            }
            IntervalUnit::Year => {
                let months = total.checked_mul(12)?;
                origin.checked_add_months(Months::new(u32::try_from(months).ok()?))
            }
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.code())
    }
}

/// How far a recurrence repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceBound {
    /// Exactly this many occurrences, counting the original event.
    Count(u32),
    /// Occurrences whose start date is on or before this date.
    Until(NaiveDate),
}

/// Immutable recurrence rule attached to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    event_id: EventId,
    interval: Interval,
    bound: RecurrenceBound,
}

impl RecurrenceRule {
    /// Builds a rule from already-typed parts.
    ///
    /// # Errors
    /// - `NonPositiveAmount(0)` when `bound` is `Count(0)`; a zero count is
    ///   only meaningful as the serialized end-date sentinel.
    pub fn new(
        event_id: EventId,
        interval: Interval,
        bound: RecurrenceBound,
    ) -> Result<Self, RecurrenceError> {
        if bound == RecurrenceBound::Count(0) {
            return Err(RecurrenceError::NonPositiveAmount(0));
        }
        Ok(Self {
            event_id,
            interval,
            bound,
        })
    }

    /// Parses a rule from its persisted/form representation.
    ///
    /// - `interval_spec`: `<positive integer><d|w|m|y>`.
    /// - `times > 0`: count-bounded; `end_date_spec` is ignored.
    /// - `times == 0`: `end_date_spec` must be a `YYYY-MM-DD` date.
    ///
    /// # Errors
    /// Returns a `RecurrenceError` describing the first invalid input.
    pub fn parse(
        event_id: EventId,
        interval_spec: &str,
        times: i64,
        end_date_spec: &str,
    ) -> Result<Self, RecurrenceError> {
        let interval = Interval::parse(interval_spec)?;

        let bound = match times {
            t if t < 0 => return Err(RecurrenceError::NegativeTimes(t)),
            0 => {
                let trimmed = end_date_spec.trim();
                let date = NaiveDate::parse_from_str(trimmed, END_DATE_FORMAT)
                    .map_err(|_| RecurrenceError::InvalidEndDate(trimmed.to_string()))?;
                RecurrenceBound::Until(date)
            }
            t => RecurrenceBound::Count(
                u32::try_from(t).map_err(|_| RecurrenceError::TimesOutOfRange(t))?,
            ),
        };

        Ok(Self {
            event_id,
            interval,
            bound,
        })
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bound(&self) -> RecurrenceBound {
        self.bound
    }

    /// Occurrence count; `0` means the rule is bounded by `end_date()`.
    pub fn times(&self) -> u32 {
        match self.bound {
            RecurrenceBound::Count(times) => times,
            RecurrenceBound::Until(_) => 0,
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self.bound {
            RecurrenceBound::Count(_) => None,
            RecurrenceBound::Until(date) => Some(date),
        }
    }

    /// Compact interval form, the inverse of the `interval_spec` accepted by `parse`.
    pub fn to_interval_string(&self) -> String {
        self.interval.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Interval, IntervalUnit, RecurrenceBound, RecurrenceError, RecurrenceRule};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn interval_parse_accepts_all_units() {
        for (spec, unit) in [
            ("1d", IntervalUnit::Day),
            ("2w", IntervalUnit::Week),
            ("3m", IntervalUnit::Month),
            ("10y", IntervalUnit::Year),
        ] {
            let interval = Interval::parse(spec).unwrap();
            assert_eq!(interval.unit(), unit);
            assert_eq!(interval.to_string(), spec);
        }
    }

    #[test]
    fn interval_parse_rejects_bad_input() {
        assert_eq!(
            Interval::parse("d").unwrap_err(),
            RecurrenceError::InvalidInterval("d".to_string())
        );
        assert_eq!(
            Interval::parse("0w").unwrap_err(),
            RecurrenceError::NonPositiveAmount(0)
        );
        assert_eq!(
            Interval::parse("-2d").unwrap_err(),
            RecurrenceError::NonPositiveAmount(-2)
        );
        assert_eq!(
            Interval::parse("3x").unwrap_err(),
            RecurrenceError::UnknownUnit('x')
        );
        assert!(matches!(
            Interval::parse("1dd").unwrap_err(),
            RecurrenceError::InvalidInterval(_)
        ));
        assert!(matches!(
            Interval::parse("99999999999d").unwrap_err(),
            RecurrenceError::InvalidInterval(_)
        ));
    }

    #[test]
    fn month_shift_clamps_to_month_end_without_drift() {
        let interval = Interval::new(1, IntervalUnit::Month).unwrap();
        let origin = at(2024, 1, 31);
        assert_eq!(interval.shift(origin, 1), Some(at(2024, 2, 29)));
        assert_eq!(interval.shift(origin, 2), Some(at(2024, 3, 31)));
        assert_eq!(interval.shift(origin, 3), Some(at(2024, 4, 30)));
    }

    #[test]
    fn year_shift_clamps_leap_day() {
        let interval = Interval::new(1, IntervalUnit::Year).unwrap();
        let origin = at(2024, 2, 29);
        assert_eq!(interval.shift(origin, 1), Some(at(2025, 2, 28)));
        assert_eq!(interval.shift(origin, 4), Some(at(2028, 2, 29)));
    }

    #[test]
    fn week_shift_keeps_time_of_day() {
        let interval = Interval::new(2, IntervalUnit::Week).unwrap();
        assert_eq!(interval.shift(at(2024, 1, 1), 3), Some(at(2024, 2, 12)));
    }

    #[test]
    fn parse_count_rule_ignores_end_date() {
        let rule = RecurrenceRule::parse(4, "1w", 3, "not-a-date").unwrap();
        assert_eq!(rule.event_id(), 4);
        assert_eq!(rule.times(), 3);
        assert_eq!(rule.end_date(), None);
        assert_eq!(rule.to_interval_string(), "1w");
    }

    #[test]
    fn parse_zero_times_requires_end_date() {
        let rule = RecurrenceRule::parse(1, "1d", 0, "2024-01-05").unwrap();
        assert_eq!(rule.times(), 0);
        assert_eq!(
            rule.bound(),
            RecurrenceBound::Until(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );

        assert_eq!(
            RecurrenceRule::parse(1, "1d", 0, "0").unwrap_err(),
            RecurrenceError::InvalidEndDate("0".to_string())
        );
        assert_eq!(
            RecurrenceRule::parse(1, "1d", 0, "").unwrap_err(),
            RecurrenceError::InvalidEndDate(String::new())
        );
    }

    #[test]
    fn parse_rejects_negative_times() {
        assert_eq!(
            RecurrenceRule::parse(1, "1d", -1, "0").unwrap_err(),
            RecurrenceError::NegativeTimes(-1)
        );
    }

    #[test]
    fn parse_rejects_times_beyond_u32() {
        let too_many = i64::from(u32::MAX) + 1;
        let err = RecurrenceRule::parse(1, "1d", too_many, "0").unwrap_err();
        assert_eq!(err, RecurrenceError::TimesOutOfRange(too_many));
        assert!(!err.to_string().contains("negative"));

        let rule = RecurrenceRule::parse(1, "1d", i64::from(u32::MAX), "0").unwrap();
        assert_eq!(rule.times(), u32::MAX);
    }

    #[test]
    fn new_rejects_zero_count() {
        let interval = Interval::new(1, IntervalUnit::Day).unwrap();
        assert!(RecurrenceRule::new(1, interval, RecurrenceBound::Count(0)).is_err());
        assert!(RecurrenceRule::new(1, interval, RecurrenceBound::Count(1)).is_ok());
    }
}
