use calplan_core::{Event, StoreConfig};
use chrono::NaiveDate;
use std::path::Path;

#[test]
fn config_defaults_file_names_when_omitted() {
    let config: StoreConfig =
        serde_json::from_value(serde_json::json!({ "data_dir": "/srv/planner" })).unwrap();

    assert_eq!(config, StoreConfig::new("/srv/planner"));
    assert_eq!(config.events_path(), Path::new("/srv/planner/event.csv"));
}

#[test]
fn config_honours_custom_file_names() {
    let config: StoreConfig = serde_json::from_value(serde_json::json!({
        "data_dir": "/srv/planner",
        "events_file": "events.csv",
        "recurrences_file": "rules.csv"
    }))
    .unwrap();

    assert_eq!(config.events_path(), Path::new("/srv/planner/events.csv"));
    assert_eq!(config.recurrences_path(), Path::new("/srv/planner/rules.csv"));
}

#[test]
fn event_serializes_naive_date_times() {
    let start = NaiveDate::from_ymd_opt(2024, 3, 10)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let event = Event::new(1, "dentist", "", start, start + chrono::Duration::hours(1));

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["start"], "2024-03-10T09:00:00");
    assert_eq!(json["end"], "2024-03-10T10:00:00");

    let decoded: Event = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, event);
}
