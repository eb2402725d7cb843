//! Store configuration.
//!
//! # Responsibility
//! - Describe where the flat data files live.
//! - Stay serde-friendly so host applications can embed it in their own
//!   configuration documents.
//!
//! # Invariants
//! - File names are plain names resolved inside `data_dir`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_EVENTS_FILE: &str = "event.csv";
pub const DEFAULT_RECURRENCES_FILE: &str = "recurrent.csv";

/// Location of the event and recurrence files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding both data files. Created on first load/save.
    pub data_dir: PathBuf,
    #[serde(default = "default_events_file")]
    pub events_file: String,
    #[serde(default = "default_recurrences_file")]
    pub recurrences_file: String,
}

impl StoreConfig {
    /// Uses the default file names inside `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            events_file: default_events_file(),
            recurrences_file: default_recurrences_file(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join(&self.events_file)
    }

    pub fn recurrences_path(&self) -> PathBuf {
        self.data_dir.join(&self.recurrences_file)
    }
}

fn default_events_file() -> String {
    DEFAULT_EVENTS_FILE.to_string()
}

fn default_recurrences_file() -> String {
    DEFAULT_RECURRENCES_FILE.to_string()
}
