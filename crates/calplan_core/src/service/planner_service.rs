//! Planner use-case service.
//!
//! # Responsibility
//! - Provide create/edit/delete flows that keep event, rule and files in step.
//! - Validate recurrence input before any store mutation.
//!
//! # Invariants
//! - A rejected recurrence request leaves the store untouched.
//! - Every successful mutation is followed by `EventStore::save`.

use crate::config::StoreConfig;
use crate::model::event::{Event, EventId, EventPatch};
use crate::model::occurrence::Occurrence;
use crate::model::recurrence::{RecurrenceError, RecurrenceRule, END_DATE_FORMAT};
use crate::store::{EventStore, StoreError, StoreResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Recurrence input as collected by a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRequest {
    /// Compact interval, e.g. `1d` or `2w`.
    pub interval: String,
    /// Occurrence count; `0` means "repeat until `end_date`".
    pub times: i64,
    /// Required when `times == 0`, ignored otherwise.
    pub end_date: Option<NaiveDate>,
}

impl RecurrenceRequest {
    /// Validates this request into a rule for `event_id`.
    pub fn to_rule(&self, event_id: EventId) -> Result<RecurrenceRule, RecurrenceError> {
        let end_date = self
            .end_date
            .map(|date| date.format(END_DATE_FORMAT).to_string())
            .unwrap_or_default();
        RecurrenceRule::parse(event_id, &self.interval, self.times, &end_date)
    }
}

/// Request model for scheduling a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEventRequest {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub recurrence: Option<RecurrenceRequest>,
}

/// What to do with an event's rule while rescheduling it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecurrenceChange {
    #[default]
    Keep,
    Clear,
    Set(RecurrenceRequest),
}

/// Use-case service wrapper around one `EventStore`.
pub struct PlannerService {
    store: EventStore,
}

impl PlannerService {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    /// Opens and loads the store described by `config`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        Ok(Self::new(EventStore::open(config)?))
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn into_store(self) -> EventStore {
        self.store
    }

    /// Creates an event with its optional rule and saves.
    ///
    /// # Contract
    /// - Recurrence input is validated before the event is created.
    /// - Returns the created event snapshot.
    pub fn schedule_event(&mut self, request: &ScheduleEventRequest) -> StoreResult<Event> {
        // Validated against the id the event is about to receive.
        let next_id = self.store.next_id();
        let rule = request
            .recurrence
            .as_ref()
            .map(|recurrence| recurrence.to_rule(next_id))
            .transpose()?;

        let event = self.store.create_event(
            request.title.clone(),
            request.description.clone(),
            request.start,
            request.end,
        )?;
        if let Some(rule) = rule {
            self.store.set_recurrence(rule)?;
        }
        self.store.save()?;
        Ok(event)
    }

    /// Applies `patch` and `recurrence` to an existing event and saves.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when `id` is absent; nothing is changed.
    /// - `StoreError::Recurrence` for invalid input; nothing is changed.
    pub fn reschedule_event(
        &mut self,
        id: EventId,
        patch: &EventPatch,
        recurrence: &RecurrenceChange,
    ) -> StoreResult<Event> {
        if self.store.find_event(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        let rule = match recurrence {
            RecurrenceChange::Set(request) => Some(request.to_rule(id)?),
            RecurrenceChange::Keep | RecurrenceChange::Clear => None,
        };

        let event = self.store.update_event(id, patch)?;
        match (recurrence, rule) {
            (RecurrenceChange::Clear, _) => self.store.clear_recurrence(id),
            (_, Some(rule)) => self.store.set_recurrence(rule)?,
            _ => {}
        }
        self.store.save()?;
        Ok(event)
    }

    /// Deletes an event with its rule and saves. Absent ids still save.
    pub fn remove_event(&mut self, id: EventId) -> StoreResult<()> {
        self.store.delete_event(id);
        self.store.save()
    }

    /// Occurrences between two dates, grouped by start date.
    pub fn agenda(&self, from: NaiveDate, to: NaiveDate) -> BTreeMap<NaiveDate, Vec<Occurrence>> {
        self.store.occurrences_between(from, to)
    }
}
