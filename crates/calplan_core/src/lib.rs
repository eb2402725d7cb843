//! Core domain logic for the calendar planner.
//! Owns events, recurrence expansion and the flat-file store; front ends
//! supply already-parsed date-times and strings.

pub mod codec;
pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod timeline;

pub use config::StoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::event::{Event, EventId, EventPatch};
pub use model::occurrence::Occurrence;
pub use model::recurrence::{
    Interval, IntervalUnit, RecurrenceBound, RecurrenceError, RecurrenceRule,
};
pub use service::planner_service::{
    PlannerService, RecurrenceChange, RecurrenceRequest, ScheduleEventRequest,
};
pub use store::{EventStore, LoadSummary, RestoreMode, StoreError, StoreResult};
pub use timeline::expand;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
