//! Event store and flat-file persistence.
//!
//! # Responsibility
//! - Own the canonical event and recurrence collections.
//! - Persist them as two delimiter-separated files with crash-safe writes.
//! - Produce backups and restore them by replace or merge.
//!
//! # Invariants
//! - Saves never leave a half-written data file in place.
//! - Malformed rows are skipped during load, never during save.
//! - Lookups of absent ids return `None`; only explicit updates of absent
//!   events return `StoreError::NotFound`.

mod event_store;
mod flat_file;

pub use event_store::{EventStore, LoadSummary, RestoreMode};
pub use flat_file::{
    BACKUP_EVENTS_MARKER, BACKUP_RECURRENCES_MARKER, EVENTS_HEADER, RECURRENCES_HEADER,
};

use crate::model::event::EventId;
use crate::model::recurrence::RecurrenceError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for validation and persistence failures.
#[derive(Debug)]
pub enum StoreError {
    Recurrence(RecurrenceError),
    NotFound(EventId),
    /// Every assignable event id has been used.
    IdsExhausted,
    /// The target file is held open by another program.
    FileInUse { path: PathBuf, source: io::Error },
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recurrence(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::IdsExhausted => write!(f, "no event ids left to assign"),
            Self::FileInUse { path, .. } => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                write!(
                    f,
                    "unable to save {name}; please close any program using the file and try again"
                )
            }
            Self::Io {
                action,
                path,
                source,
            } => write!(f, "failed to {action} `{}`: {source}", path.display()),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Recurrence(err) => Some(err),
            Self::NotFound(_) | Self::IdsExhausted => None,
            Self::FileInUse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<RecurrenceError> for StoreError {
    fn from(value: RecurrenceError) -> Self {
        Self::Recurrence(value)
    }
}
