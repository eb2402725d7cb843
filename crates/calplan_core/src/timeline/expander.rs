use crate::model::event::Event;
use crate::model::occurrence::Occurrence;
use crate::model::recurrence::{RecurrenceBound, RecurrenceRule};
use chrono::{NaiveDate, NaiveDateTime};

/// Returns whether `[start, end]` touches `[range_start, range_end]` when both
/// are compared as calendar dates.
pub fn overlaps(
    start: NaiveDateTime,
    end: NaiveDateTime,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> bool {
    start.date() <= range_end && end.date() >= range_start
}

/// Expands `event` against `rule` into occurrences overlapping the range.
///
/// Candidate `n` starts at the base start advanced by `n` intervals and keeps
/// the base duration. Candidates are generated in start order:
/// - `Count(times)`: candidates `0..times`.
/// - `Until(date)`: candidates whose start date is `<= date`.
///
/// Generation stops at the first candidate starting after `range_end`;
/// earlier candidates are still walked so indexing stays anchored on the
/// base event. An inverted range yields nothing.
pub fn expand(
    event: &Event,
    rule: Option<&RecurrenceRule>,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<Occurrence> {
    if range_start > range_end {
        return Vec::new();
    }

    let Some(rule) = rule else {
        if overlaps(event.start, event.end, range_start, range_end) {
            return vec![occurrence_of(event, event.start, event.end)];
        }
        return Vec::new();
    };

    let interval = rule.interval();
    let bound = rule.bound();
    let duration = event.end - event.start;
    let mut occurrences = Vec::new();
    let mut step: u32 = 0;

    loop {
        if let RecurrenceBound::Count(times) = bound {
            if step >= times {
                break;
            }
        }

        let Some(start) = interval.shift(event.start, step) else {
            break;
        };
        let start_date = start.date();
        if start_date > range_end {
            break;
        }
        if let RecurrenceBound::Until(until) = bound {
            if start_date > until {
                break;
            }
        }
        let Some(end) = start.checked_add_signed(duration) else {
            break;
        };

        if overlaps(start, end, range_start, range_end) {
            occurrences.push(occurrence_of(event, start, end));
        }

        step = match step.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    occurrences
}

fn occurrence_of(event: &Event, start: NaiveDateTime, end: NaiveDateTime) -> Occurrence {
    Occurrence {
        event_id: event.id,
        title: event.title.clone(),
        start,
        end,
    }
}
