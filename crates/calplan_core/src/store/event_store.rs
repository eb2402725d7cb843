//! In-memory event store backed by two flat files.
//!
//! # Responsibility
//! - Assign event ids and provide CRUD over events and recurrence rules.
//! - Answer range queries by delegating to timeline expansion.
//! - Load, save, back up and restore the flat data files.
//!
//! # Invariants
//! - `next_id` is owned by the instance, only grows while running, and is
//!   recomputed as `max(id) + 1` (minimum 1) on load.
//! - Deleting an event also deletes its recurrence rule.
//! - Callers receive snapshots; edits go through `update_event`.
//!
//! # See also
//! - `store::flat_file` for the on-disk layout helpers.

use super::flat_file::{
    compose_backup, ensure_dir, join_lines, merge_lines, read_optional, split_backup,
    write_atomic, StagedFile, EVENTS_HEADER, RECURRENCES_HEADER,
};
use super::{StoreError, StoreResult};
use crate::codec::{decode_row, encode_row, split_records, Record};
use crate::config::StoreConfig;
use crate::model::event::{Event, EventId, EventPatch};
use crate::model::occurrence::Occurrence;
use crate::model::recurrence::{RecurrenceRule, END_DATE_FORMAT};
use crate::timeline;
use chrono::{NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// Canonical, sortable date-time form written to the events file.
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
/// Minute-precision form accepted on read.
const DATE_TIME_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Serialized end date for count-bounded rules.
const NO_END_DATE: &str = "0";

const EVENT_FIELDS: usize = 5;
const RECURRENCE_FIELDS: usize = 4;

/// How `EventStore::restore` combines a backup with the live files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Overwrite both data files with the backup sections.
    Replace,
    /// Append backup rows to the data files, skipping a duplicate header.
    Merge,
}

/// Counts reported by `EventStore::load`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub events: usize,
    pub recurrences: usize,
    /// Data rows dropped as malformed.
    pub skipped_rows: usize,
}

/// Owner of all events and recurrence rules.
#[derive(Debug)]
pub struct EventStore {
    config: StoreConfig,
    events: BTreeMap<EventId, Event>,
    recurrences: BTreeMap<EventId, RecurrenceRule>,
    next_id: EventId,
}

impl EventStore {
    /// Creates an empty store. Call `load` to read existing files.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            events: BTreeMap::new(),
            recurrences: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Creates a store and loads it from disk.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let mut store = Self::new(config);
        store.load()?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Id the next created event will receive.
    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    /// Creates an event with the next id and returns its snapshot.
    ///
    /// # Errors
    /// - `StoreError::IdsExhausted` when no id is left; the store is unchanged.
    pub fn create_event(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> StoreResult<Event> {
        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        let event = Event::new(id, title, description, start, end);
        self.next_id = next_id;
        self.events.insert(id, event.clone());
        Ok(event)
    }

    pub fn find_event(&self, id: EventId) -> Option<Event> {
        self.events.get(&id).cloned()
    }

    /// All events ordered by start, ties by id (creation order).
    pub fn list_events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self.events.values().cloned().collect();
        events.sort_by_key(|event| event.start);
        events
    }

    /// Replaces the stored event with `patch` applied and returns the result.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when `id` is absent.
    pub fn update_event(&mut self, id: EventId, patch: &EventPatch) -> StoreResult<Event> {
        let stored = self.events.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let updated = stored.patched(patch);
        *stored = updated.clone();
        Ok(updated)
    }

    /// Removes the event and its rule. Absent ids are ignored.
    pub fn delete_event(&mut self, id: EventId) {
        self.events.remove(&id);
        self.recurrences.remove(&id);
    }

    /// Attaches `rule` to its event, replacing any previous rule.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when the rule's event does not exist.
    pub fn set_recurrence(&mut self, rule: RecurrenceRule) -> StoreResult<()> {
        if !self.events.contains_key(&rule.event_id()) {
            return Err(StoreError::NotFound(rule.event_id()));
        }
        self.recurrences.insert(rule.event_id(), rule);
        Ok(())
    }

    pub fn clear_recurrence(&mut self, event_id: EventId) {
        self.recurrences.remove(&event_id);
    }

    pub fn find_recurrence(&self, event_id: EventId) -> Option<RecurrenceRule> {
        self.recurrences.get(&event_id).cloned()
    }

    /// All rules ordered by event id.
    pub fn list_recurrences(&self) -> Vec<RecurrenceRule> {
        self.recurrences.values().cloned().collect()
    }

    /// Expands every event over the range and groups occurrences by start date.
    ///
    /// Each day's occurrences are sorted by start time, ties by event id.
    pub fn occurrences_between(
        &self,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> BTreeMap<NaiveDate, Vec<Occurrence>> {
        let mut by_date: BTreeMap<NaiveDate, Vec<Occurrence>> = BTreeMap::new();
        for event in self.events.values() {
            let rule = self.recurrences.get(&event.id);
            for occurrence in timeline::expand(event, rule, range_start, range_end) {
                by_date
                    .entry(occurrence.start_date())
                    .or_default()
                    .push(occurrence);
            }
        }
        for day in by_date.values_mut() {
            day.sort_by_key(|occurrence| occurrence.start);
        }
        by_date
    }

    /// Replaces in-memory state with the contents of the data files.
    ///
    /// Missing files load as empty. Rows that cannot be decoded are skipped
    /// and counted in `LoadSummary::skipped_rows`. On error the previous
    /// in-memory state is kept.
    pub fn load(&mut self) -> StoreResult<LoadSummary> {
        let started_at = Instant::now();
        info!(
            "event=store_load module=store status=start data_dir={}",
            self.config.data_dir().display()
        );

        let result = self.load_inner();
        match &result {
            Ok(summary) => info!(
                "event=store_load module=store status=ok duration_ms={} events={} recurrences={} skipped_rows={}",
                started_at.elapsed().as_millis(),
                summary.events,
                summary.recurrences,
                summary.skipped_rows
            ),
            Err(err) => error!(
                "event=store_load module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn load_inner(&mut self) -> StoreResult<LoadSummary> {
        ensure_dir(self.config.data_dir())?;
        let events_path = self.config.events_path();
        let recurrences_path = self.config.recurrences_path();

        let mut summary = LoadSummary::default();
        let mut events = BTreeMap::new();
        let mut recurrences = BTreeMap::new();

        if let Some(text) = read_optional(&events_path)? {
            let parsed = parse_records(&events_path, &text, parse_event_record, &mut summary);
            for (_, event) in parsed {
                events.insert(event.id, event);
            }
        }

        if let Some(text) = read_optional(&recurrences_path)? {
            let parsed =
                parse_records(&recurrences_path, &text, parse_recurrence_record, &mut summary);
            for (record, rule) in parsed {
                if events.contains_key(&rule.event_id()) {
                    recurrences.insert(rule.event_id(), rule);
                } else {
                    let reason = format!("no event with id {}", rule.event_id());
                    skip_row(&recurrences_path, &record, &reason);
                    summary.skipped_rows += 1;
                }
            }
        }

        summary.events = events.len();
        summary.recurrences = recurrences.len();
        let next_id = match events.keys().next_back() {
            Some(max) => max.checked_add(1).ok_or(StoreError::IdsExhausted)?,
            None => 1,
        };
        self.next_id = next_id;
        self.events = events;
        self.recurrences = recurrences;
        Ok(summary)
    }

    /// Writes both data files through temp files and atomic renames.
    ///
    /// Both temp files are written before either target is replaced.
    ///
    /// # Errors
    /// - `StoreError::FileInUse` when a target is held open elsewhere.
    /// - `StoreError::Io` for any other write or rename failure.
    pub fn save(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.save_inner();
        match &result {
            Ok(()) => info!(
                "event=store_save module=store status=ok duration_ms={} events={} recurrences={}",
                started_at.elapsed().as_millis(),
                self.events.len(),
                self.recurrences.len()
            ),
            Err(err) => error!(
                "event=store_save module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn save_inner(&self) -> StoreResult<()> {
        ensure_dir(self.config.data_dir())?;

        let mut event_rows = vec![EVENTS_HEADER.to_string()];
        event_rows.extend(self.list_events().iter().map(event_row));
        let mut recurrence_rows = vec![RECURRENCES_HEADER.to_string()];
        recurrence_rows.extend(self.recurrences.values().map(recurrence_row));

        let staged_events = StagedFile::write(&self.config.events_path(), &join_lines(&event_rows))?;
        let staged_recurrences = StagedFile::write(
            &self.config.recurrences_path(),
            &join_lines(&recurrence_rows),
        )?;
        staged_events.commit()?;
        staged_recurrences.commit()
    }

    /// Writes a backup of the current on-disk data files to `path`.
    ///
    /// Unsaved in-memory changes are not included.
    pub fn backup(&self, path: &Path) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.write_backup(path);

        match &result {
            Ok(()) => info!(
                "event=store_backup module=store status=ok duration_ms={} path={}",
                started_at.elapsed().as_millis(),
                path.display()
            ),
            Err(err) => error!(
                "event=store_backup module=store status=error duration_ms={} path={} error={}",
                started_at.elapsed().as_millis(),
                path.display(),
                err
            ),
        }
        result
    }

    fn write_backup(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let events_text = read_optional(&self.config.events_path())?;
        let recurrences_text = read_optional(&self.config.recurrences_path())?;
        write_atomic(
            path,
            &compose_backup(events_text.as_deref(), recurrences_text.as_deref()),
        )
    }

    /// Restores data files from a backup, then reloads.
    ///
    /// In `Merge` mode a backup row whose event id already exists wins on
    /// reload, since later rows replace earlier ones.
    pub fn restore(&mut self, path: &Path, mode: RestoreMode) -> StoreResult<LoadSummary> {
        let started_at = Instant::now();
        let result = self.restore_files(path, mode);

        match &result {
            Ok(()) => info!(
                "event=store_restore module=store status=ok duration_ms={} path={} mode={:?}",
                started_at.elapsed().as_millis(),
                path.display(),
                mode
            ),
            Err(err) => error!(
                "event=store_restore module=store status=error duration_ms={} path={} mode={:?} error={}",
                started_at.elapsed().as_millis(),
                path.display(),
                mode,
                err
            ),
        }
        result?;
        self.load()
    }

    fn restore_files(&self, path: &Path, mode: RestoreMode) -> StoreResult<()> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| StoreError::io("read backup", path, err))?;
        let sections = split_backup(&text);
        ensure_dir(self.config.data_dir())?;

        let targets = [
            (self.config.events_path(), sections.events),
            (self.config.recurrences_path(), sections.recurrences),
        ];
        for (target, lines) in targets {
            match mode {
                RestoreMode::Replace => write_atomic(&target, &join_lines(&lines))?,
                RestoreMode::Merge => {
                    let existing = read_optional(&target)?;
                    if let Some(merged) = merge_lines(existing.as_deref(), &lines) {
                        write_atomic(&target, &merged)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Records after the header row.
fn data_records(text: &str) -> impl Iterator<Item = Record> {
    split_records(text).into_iter().skip(1)
}

/// Parses every data record, skipping and counting the malformed ones.
///
/// A multi-line record that fails to parse is retried one physical line at
/// a time, so a stray quote only costs the row it appears in.
fn parse_records<T>(
    path: &Path,
    text: &str,
    parse: impl Fn(&str) -> Result<T, String>,
    summary: &mut LoadSummary,
) -> Vec<(Record, T)> {
    let mut parsed = Vec::new();
    for record in data_records(text) {
        match parse(&record.text) {
            Ok(value) => parsed.push((record, value)),
            Err(_) if record.is_multi_line() => {
                for line in record.physical_lines() {
                    match parse(&line.text) {
                        Ok(value) => parsed.push((line, value)),
                        Err(reason) => {
                            skip_row(path, &line, &reason);
                            summary.skipped_rows += 1;
                        }
                    }
                }
            }
            Err(reason) => {
                skip_row(path, &record, &reason);
                summary.skipped_rows += 1;
            }
        }
    }
    parsed
}

fn skip_row(path: &Path, record: &Record, reason: &str) {
    warn!(
        "event=row_skipped module=store file={} line={} reason={}",
        path.display(),
        record.line_no,
        reason
    );
}

fn event_row(event: &Event) -> String {
    encode_row(&[
        event.id.to_string(),
        event.title.clone(),
        event.description.clone(),
        format_date_time(event.start),
        format_date_time(event.end),
    ])
}

fn recurrence_row(rule: &RecurrenceRule) -> String {
    let end_date = rule.end_date().map_or_else(
        || NO_END_DATE.to_string(),
        |date| date.format(END_DATE_FORMAT).to_string(),
    );
    encode_row(&[
        rule.event_id().to_string(),
        rule.to_interval_string(),
        rule.times().to_string(),
        end_date,
    ])
}

fn parse_event_record(text: &str) -> Result<Event, String> {
    let fields = decode_row(text);
    if fields.len() < EVENT_FIELDS {
        return Err(format!(
            "expected {EVENT_FIELDS} fields, found {}",
            fields.len()
        ));
    }
    let id = parse_id(&fields[0])?;
    if id == EventId::MAX {
        return Err(format!("event id {id} leaves no id for the next event"));
    }
    let start = parse_date_time(&fields[3])?;
    let end = parse_date_time(&fields[4])?;
    Ok(Event::new(id, fields[1].clone(), fields[2].clone(), start, end))
}

fn parse_recurrence_record(text: &str) -> Result<RecurrenceRule, String> {
    let fields = decode_row(text);
    if fields.len() < RECURRENCE_FIELDS {
        return Err(format!(
            "expected {RECURRENCE_FIELDS} fields, found {}",
            fields.len()
        ));
    }
    let event_id = parse_id(&fields[0])?;
    let times: i64 = fields[2]
        .trim()
        .parse()
        .map_err(|_| format!("invalid recurrentTimes `{}`", fields[2]))?;
    RecurrenceRule::parse(event_id, &fields[1], times, &fields[3]).map_err(|err| err.to_string())
}

fn parse_id(value: &str) -> Result<EventId, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid event id `{value}`"))
}

fn format_date_time(value: NaiveDateTime) -> String {
    value.format(DATE_TIME_FORMAT).to_string()
}

fn parse_date_time(value: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, DATE_TIME_MINUTES_FORMAT))
        .map_err(|_| format!("invalid date-time `{value}`"))
}
