//! File-level helpers for the flat data files and backups.
//!
//! All whole-file writes go through [`StagedFile`]: contents are written and
//! synced to `<name>.tmp` next to the target, then renamed over it.

use super::{StoreError, StoreResult};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const EVENTS_HEADER: &str = "eventId,title,description,startDateTime,endDateTime";
pub const RECURRENCES_HEADER: &str = "eventId,recurrentInterval,recurrentTimes,recurrentEndDate";
pub const BACKUP_EVENTS_MARKER: &str = "#EVENTS";
pub const BACKUP_RECURRENCES_MARKER: &str = "#RECURRENCES";

const TEMP_SUFFIX: &str = ".tmp";

#[cfg(windows)]
const IN_USE_OS_ERRORS: &[i32] = &[32, 33]; // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(unix)]
const IN_USE_OS_ERRORS: &[i32] = &[16, 26]; // EBUSY, ETXTBSY
#[cfg(not(any(windows, unix)))]
const IN_USE_OS_ERRORS: &[i32] = &[];

/// Reads a whole file, returning `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::io("read", path, err)),
    }
}

pub(crate) fn ensure_dir(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(path).map_err(|err| StoreError::io("create directory", path, err))
}

/// Whether a failed rename means another program holds the target open.
///
/// Windows reports a locked target as access denied; elsewhere that kind
/// is a plain permission problem.
fn is_file_in_use(err: &io::Error) -> bool {
    (cfg!(windows) && err.kind() == ErrorKind::PermissionDenied)
        || err
            .raw_os_error()
            .is_some_and(|code| IN_USE_OS_ERRORS.contains(&code))
}

/// A fully written temp file waiting to replace its target.
///
/// Dropping an uncommitted stage removes the temp file.
pub(crate) struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub(crate) fn write(target: &Path, contents: &str) -> StoreResult<Self> {
        let mut temp_name = target
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        temp_name.push(TEMP_SUFFIX);
        let staged = Self {
            temp_path: target.with_file_name(temp_name),
            target: target.to_path_buf(),
            committed: false,
        };

        let write_result = File::create(&staged.temp_path).and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        });
        match write_result {
            Ok(()) => Ok(staged),
            Err(err) => Err(StoreError::io("write", staged.temp_path.clone(), err)),
        }
    }

    /// Atomically renames the temp file over the target.
    pub(crate) fn commit(mut self) -> StoreResult<()> {
        match fs::rename(&self.temp_path, &self.target) {
            Ok(()) => {
                self.committed = true;
                Ok(())
            }
            Err(err) if is_file_in_use(&err) => Err(StoreError::FileInUse {
                path: self.target.clone(),
                source: err,
            }),
            Err(err) => Err(StoreError::io("replace", self.target.clone(), err)),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

pub(crate) fn write_atomic(target: &Path, contents: &str) -> StoreResult<()> {
    StagedFile::write(target, contents)?.commit()
}

/// Lines of `text` split on `\n` only, so a `\r` inside a record is kept.
fn raw_lines(text: &str) -> impl Iterator<Item = &str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    (!text.is_empty()).then(|| body.split('\n')).into_iter().flatten()
}

/// Joins lines into file text, one terminator per line.
pub(crate) fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    text
}

/// Builds backup text from the raw contents of both data files.
pub(crate) fn compose_backup(events_text: Option<&str>, recurrences_text: Option<&str>) -> String {
    let mut backup = String::new();
    backup.push_str(BACKUP_EVENTS_MARKER);
    backup.push('\n');
    for line in raw_lines(events_text.unwrap_or_default()) {
        backup.push_str(line);
        backup.push('\n');
    }
    backup.push_str(BACKUP_RECURRENCES_MARKER);
    backup.push('\n');
    for line in raw_lines(recurrences_text.unwrap_or_default()) {
        backup.push_str(line);
        backup.push('\n');
    }
    backup
}

/// Raw data-file lines recovered from a backup, headers included.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct BackupSections {
    pub events: Vec<String>,
    pub recurrences: Vec<String>,
}

/// Splits backup text by marker line. Lines before the first marker are ignored.
pub(crate) fn split_backup(text: &str) -> BackupSections {
    enum Section {
        None,
        Events,
        Recurrences,
    }

    let mut sections = BackupSections::default();
    let mut current = Section::None;
    for line in raw_lines(text) {
        let marker = line.strip_suffix('\r').unwrap_or(line);
        if marker == BACKUP_EVENTS_MARKER {
            current = Section::Events;
            continue;
        }
        if marker == BACKUP_RECURRENCES_MARKER {
            current = Section::Recurrences;
            continue;
        }
        match current {
            Section::Events => sections.events.push(line.to_string()),
            Section::Recurrences => sections.recurrences.push(line.to_string()),
            Section::None => {}
        }
    }
    sections
}

/// Computes file contents after merging `incoming` lines into `existing` text.
///
/// - No incoming lines: `None` (file untouched).
/// - Missing or empty existing file: incoming lines verbatim.
/// - Otherwise incoming lines are appended, dropping the first incoming line
///   when it equals the existing first line (the shared header).
pub(crate) fn merge_lines(existing: Option<&str>, incoming: &[String]) -> Option<String> {
    let first_incoming = incoming.first()?;

    let existing = match existing {
        Some(text) if !text.is_empty() => text,
        _ => return Some(join_lines(incoming)),
    };

    let skip = usize::from(raw_lines(existing).next() == Some(first_incoming.as_str()));
    let mut merged = existing.to_string();
    if !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged.push_str(&join_lines(&incoming[skip..]));
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::{compose_backup, merge_lines, split_backup, write_atomic, StagedFile};

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn backup_round_trips_through_split() {
        let backup = compose_backup(Some("h1\n1,a\n"), Some("h2\n1,1d,3,0\n"));
        assert_eq!(backup, "#EVENTS\nh1\n1,a\n#RECURRENCES\nh2\n1,1d,3,0\n");

        let sections = split_backup(&backup);
        assert_eq!(sections.events, lines(&["h1", "1,a"]));
        assert_eq!(sections.recurrences, lines(&["h2", "1,1d,3,0"]));
    }

    #[test]
    fn backup_keeps_carriage_returns_inside_records() {
        let events = "h1\n1,\"one\r\ntwo\",,a,b\n";
        let backup = compose_backup(Some(events), None);
        assert_eq!(backup, format!("#EVENTS\n{events}#RECURRENCES\n"));

        let sections = split_backup(&backup);
        assert_eq!(sections.events, lines(&["h1", "1,\"one\r", "two\",,a,b"]));
    }

    #[test]
    fn backup_of_missing_files_has_only_markers() {
        let sections = split_backup(&compose_backup(None, None));
        assert!(sections.events.is_empty());
        assert!(sections.recurrences.is_empty());
    }

    #[test]
    fn merge_skips_identical_header_only() {
        let merged = merge_lines(Some("h\n1,a\n"), &lines(&["h", "2,b"])).unwrap();
        assert_eq!(merged, "h\n1,a\n2,b\n");

        let merged = merge_lines(Some("h\n1,a"), &lines(&["other", "2,b"])).unwrap();
        assert_eq!(merged, "h\n1,a\nother\n2,b\n");
    }

    #[test]
    fn merge_into_missing_or_empty_file_copies_lines() {
        assert_eq!(merge_lines(None, &lines(&["h", "1"])).unwrap(), "h\n1\n");
        assert_eq!(merge_lines(Some(""), &lines(&["h"])).unwrap(), "h\n");
        assert_eq!(merge_lines(Some("h\n"), &[]), None);
    }

    #[test]
    fn merge_matches_header_of_crlf_files_exactly() {
        let merged = merge_lines(Some("h\r\n1,a\r\n"), &lines(&["h\r", "2,b\r"])).unwrap();
        assert_eq!(merged, "h\r\n1,a\r\n2,b\r\n");
    }

    #[cfg(unix)]
    #[test]
    fn only_busy_errors_count_as_in_use_on_unix() {
        use super::is_file_in_use;
        use std::io::{self, ErrorKind};

        assert!(!is_file_in_use(&io::Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_file_in_use(&io::Error::from_raw_os_error(21)));
        assert!(is_file_in_use(&io::Error::from_raw_os_error(16)));
        assert!(is_file_in_use(&io::Error::from_raw_os_error(26)));
    }

    #[test]
    fn dropped_stage_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("event.csv");

        let staged = StagedFile::write(&target, "draft").unwrap();
        assert!(dir.path().join("event.csv.tmp").exists());
        drop(staged);

        assert!(!dir.path().join("event.csv.tmp").exists());
        assert!(!target.exists());
    }

    #[test]
    fn write_atomic_replaces_target_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("event.csv");
        std::fs::write(&target, "old").unwrap();

        write_atomic(&target, "new\n").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new\n");
        assert!(!dir.path().join("event.csv.tmp").exists());
    }
}
