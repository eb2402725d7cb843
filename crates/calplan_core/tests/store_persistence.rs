use calplan_core::{EventId, EventStore, LoadSummary, RecurrenceRule, StoreConfig, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;

fn at(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[test]
fn save_then_load_round_trips_events_and_rules() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());

    let mut store = EventStore::new(config.clone());
    let tricky = store.create_event(
        "Lunch, \"the usual\"",
        "bring:\n- notes\n- laptop, charger",
        at(3, 10, 12, 0),
        at(3, 10, 13, 30),
    )
    .unwrap();
    let plain = store.create_event("gym", "", at(3, 9, 18, 15), at(3, 9, 19, 0)).unwrap();
    let weekly = RecurrenceRule::parse(tricky.id, "1w", 4, "0").unwrap();
    let monthly = RecurrenceRule::parse(plain.id, "1m", 0, "2024-12-31").unwrap();
    store.set_recurrence(weekly.clone()).unwrap();
    store.set_recurrence(monthly.clone()).unwrap();
    store.save().unwrap();

    let mut reloaded = EventStore::new(config);
    let summary = reloaded.load().unwrap();
    assert_eq!(
        summary,
        LoadSummary {
            events: 2,
            recurrences: 2,
            skipped_rows: 0
        }
    );
    assert_eq!(reloaded.list_events(), store.list_events());
    assert_eq!(reloaded.list_recurrences(), vec![weekly, monthly]);
    assert_eq!(reloaded.next_id(), 3);
}

#[test]
fn saved_files_have_fixed_headers_and_no_temp_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    let mut store = EventStore::new(config.clone());
    let event = store.create_event("a,b", "", at(1, 1, 8, 0), at(1, 1, 9, 0)).unwrap();
    store
        .set_recurrence(RecurrenceRule::parse(event.id, "2d", 5, "0").unwrap())
        .unwrap();
    store.save().unwrap();

    let events = fs::read_to_string(config.events_path()).unwrap();
    assert_eq!(
        events,
        "eventId,title,description,startDateTime,endDateTime\n\
         1,\"a,b\",,2024-01-01T08:00:00,2024-01-01T09:00:00\n"
    );
    let recurrences = fs::read_to_string(config.recurrences_path()).unwrap();
    assert_eq!(
        recurrences,
        "eventId,recurrentInterval,recurrentTimes,recurrentEndDate\n1,2d,5,0\n"
    );

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn load_of_empty_directory_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("nested").join("data");

    let store = EventStore::open(StoreConfig::new(&data_dir)).unwrap();
    assert!(store.list_events().is_empty());
    assert_eq!(store.next_id(), 1);
    assert!(data_dir.is_dir());
}

#[test]
fn load_skips_malformed_rows_and_recomputes_next_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(
        config.events_path(),
        "eventId,title,description,startDateTime,endDateTime\n\
         3,kept,,2024-01-01T08:00,2024-01-01T09:00\n\
         4,too,few\n\
         \n\
         x,bad id,,2024-01-01T08:00,2024-01-01T09:00\n\
         9,also kept,,2024-01-02T08:00:00,2024-01-02T09:00:00\n",
    )
    .unwrap();
    fs::write(
        config.recurrences_path(),
        "eventId,recurrentInterval,recurrentTimes,recurrentEndDate\n\
         3,1d,2,0\n\
         9,1z,2,0\n\
         12,1d,2,0\n\
         9,1w\n",
    )
    .unwrap();

    let mut store = EventStore::new(config);
    let summary = store.load().unwrap();

    assert_eq!(summary.events, 2);
    assert_eq!(summary.recurrences, 1);
    assert_eq!(summary.skipped_rows, 6);
    assert_eq!(store.next_id(), 10);
    assert_eq!(store.find_event(3).unwrap().title, "kept");
    assert!(store.find_recurrence(3).is_some());
    assert!(store.find_recurrence(9).is_none());
}

#[test]
fn load_replaces_unsaved_in_memory_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = EventStore::new(StoreConfig::new(dir.path()));
    store.create_event("saved", "", at(1, 1, 8, 0), at(1, 1, 9, 0)).unwrap();
    store.save().unwrap();

    store.create_event("unsaved", "", at(1, 2, 8, 0), at(1, 2, 9, 0)).unwrap();
    store.load().unwrap();

    let titles: Vec<_> = store.list_events().into_iter().map(|e| e.title).collect();
    assert_eq!(titles, vec!["saved"]);
    assert_eq!(store.next_id(), 2);
}

#[test]
fn save_overwrites_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    let mut store = EventStore::new(config.clone());
    let event = store.create_event("temp", "", at(1, 1, 8, 0), at(1, 1, 9, 0)).unwrap();
    store.save().unwrap();

    store.delete_event(event.id);
    store.save().unwrap();

    let reloaded = EventStore::open(config).unwrap();
    assert!(reloaded.list_events().is_empty());
}

fn event_ids(store: &EventStore) -> Vec<EventId> {
    store.list_events().iter().map(|e| e.id).collect()
}

#[test]
fn stray_quote_only_costs_its_own_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(
        config.events_path(),
        "eventId,title,description,startDateTime,endDateTime\n\
         1,5\" screen,,2024-01-01T08:00:00,2024-01-01T09:00:00\n\
         2,first,,2024-01-02T08:00:00,2024-01-02T09:00:00\n\
         3,second,,2024-01-03T08:00:00,2024-01-03T09:00:00\n",
    )
    .unwrap();

    let mut store = EventStore::new(config);
    let summary = store.load().unwrap();

    assert_eq!(summary.events, 2);
    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(event_ids(&store), vec![2, 3]);
}

#[test]
fn unterminated_quoted_field_does_not_swallow_later_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(
        config.events_path(),
        "eventId,title,description,startDateTime,endDateTime\n\
         1,\"never closed,,2024-01-01T08:00:00,2024-01-01T09:00:00\n\
         2,first,,2024-01-02T08:00:00,2024-01-02T09:00:00\n\
         3,second,,2024-01-03T08:00:00,2024-01-03T09:00:00\n",
    )
    .unwrap();

    let mut store = EventStore::new(config);
    let summary = store.load().unwrap();

    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(event_ids(&store), vec![2, 3]);
}

#[test]
fn largest_id_row_is_skipped_instead_of_overflowing() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(
        config.events_path(),
        format!(
            "eventId,title,description,startDateTime,endDateTime\n\
             {},edge,,2024-01-01T08:00:00,2024-01-01T09:00:00\n\
             5,kept,,2024-01-02T08:00:00,2024-01-02T09:00:00\n",
            EventId::MAX
        ),
    )
    .unwrap();

    let mut store = EventStore::new(config);
    let summary = store.load().unwrap();

    assert_eq!(summary.events, 1);
    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(store.next_id(), 6);
}

#[test]
fn create_fails_once_ids_are_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(
        config.events_path(),
        format!(
            "eventId,title,description,startDateTime,endDateTime\n\
             {},last,,2024-01-01T08:00:00,2024-01-01T09:00:00\n",
            EventId::MAX - 1
        ),
    )
    .unwrap();

    let mut store = EventStore::open(config).unwrap();
    assert_eq!(store.next_id(), EventId::MAX);

    let err = store
        .create_event("one more", "", at(1, 2, 8, 0), at(1, 2, 9, 0))
        .unwrap_err();
    assert!(matches!(err, StoreError::IdsExhausted));
    assert_eq!(store.list_events().len(), 1);
    assert_eq!(store.next_id(), EventId::MAX);
}

#[test]
fn failed_rename_keeps_previous_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    let mut store = EventStore::new(config.clone());
    let event = store
        .create_event("kept", "", at(1, 1, 8, 0), at(1, 1, 9, 0))
        .unwrap();
    store
        .set_recurrence(RecurrenceRule::parse(event.id, "1d", 2, "0").unwrap())
        .unwrap();
    store.save().unwrap();
    let recurrences_before = fs::read_to_string(config.recurrences_path()).unwrap();

    // A non-empty directory at the events path makes the rename fail.
    fs::remove_file(config.events_path()).unwrap();
    fs::create_dir(config.events_path()).unwrap();
    fs::write(config.events_path().join("keep.txt"), "x").unwrap();

    store
        .set_recurrence(RecurrenceRule::parse(event.id, "1w", 9, "0").unwrap())
        .unwrap();
    let err = store.save().unwrap_err();

    assert!(matches!(err, StoreError::Io { .. }), "unexpected error: {err:?}");
    assert_eq!(
        fs::read_to_string(config.recurrences_path()).unwrap(),
        recurrences_before
    );
    assert!(config.events_path().join("keep.txt").exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}
