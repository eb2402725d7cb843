//! Event domain model.
//!
//! # Responsibility
//! - Define the canonical event record stored by `EventStore`.
//! - Define the partial-update shape used for explicit event edits.
//!
//! # Invariants
//! - `id` is assigned by the store and stays stable for the event lifetime.
//! - `start <= end` is NOT enforced here; ordering is the caller's job.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Store-assigned, monotonic event identifier.
pub type EventId = u64;

/// Canonical calendar event record.
///
/// Values handed out by the store are snapshots. Edits go through
/// `EventStore::update_event` with an [`EventPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    /// Naive local start date-time.
    pub start: NaiveDateTime,
    /// Naive local end date-time.
    pub end: NaiveDateTime,
}

impl Event {
    pub fn new(
        id: EventId,
        title: impl Into<String>,
        description: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            start,
            end,
        }
    }

    /// Returns a copy of this event with every `Some` field of `patch` applied.
    pub fn patched(&self, patch: &EventPatch) -> Self {
        Self {
            id: self.id,
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            start: patch.start.unwrap_or(self.start),
            end: patch.end.unwrap_or(self.end),
        }
    }
}

/// Partial update for an existing event. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl EventPatch {
    /// Returns whether applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}
