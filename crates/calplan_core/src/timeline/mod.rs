//! Timeline expansion of events into concrete occurrences.
//!
//! # Responsibility
//! - Turn one event plus its optional recurrence rule into the ordered list
//!   of occurrences overlapping a date range.
//!
//! # Invariants
//! - Expansion is pure: no store access, no clock access.
//! - Overlap is evaluated at day granularity on both ends.
//! - Every occurrence keeps the base event's title and duration.

mod expander;

pub use expander::{expand, overlaps};
