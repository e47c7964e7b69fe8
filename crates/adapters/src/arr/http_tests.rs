// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

// The response-shape helpers are where the cross-kind tolerance lives;
// they are exercised directly so no live manager is needed.

#[test]
fn records_reads_bare_arrays_and_paged_objects() {
    let bare = json!([{"id": 1}, {"id": 2}]);
    assert_eq!(records(&bare).len(), 2);

    let paged = json!({"page": 1, "records": [{"id": 1}]});
    assert_eq!(records(&paged).len(), 1);

    let neither = json!({"something": "else"});
    assert!(records(&neither).is_empty());
}

#[test]
fn u64_field_takes_the_first_present_key() {
    let record = json!({"movieId": 5, "id": 9});
    assert_eq!(u64_field(&record, &["movieId", "id"]), Some(5));
    assert_eq!(u64_field(&record, &["seriesId", "id"]), Some(9));
    assert_eq!(u64_field(&record, &["nope"]), None);
}

#[test]
fn download_percent_from_sizes() {
    let record = json!({"size": 1000.0, "sizeleft": 250.0});
    assert_eq!(download_percent(&record), Some(75));

    let done = json!({"size": 1000.0, "sizeleft": 0.0});
    assert_eq!(download_percent(&done), Some(100));

    let unknown = json!({"sizeleft": 10.0});
    assert_eq!(download_percent(&unknown), None);

    let zero = json!({"size": 0.0, "sizeleft": 0.0});
    assert_eq!(download_percent(&zero), None);
}

#[test]
fn history_kinds_map_both_manager_dialects() {
    assert_eq!(history_kind("grabbed"), HistoryEventKind::Grabbed);
    assert_eq!(
        history_kind("downloadFolderImported"),
        HistoryEventKind::Imported
    );
    assert_eq!(
        history_kind("episodeFileImported"),
        HistoryEventKind::Imported
    );
    assert_eq!(history_kind("downloadFailed"), HistoryEventKind::ImportFailed);
    assert_eq!(
        history_kind("movieFileDeleted"),
        HistoryEventKind::Deleted
    );
    assert_eq!(history_kind("unknownThing"), HistoryEventKind::Other);
}

#[test]
fn date_parsing_tolerates_missing_or_bad_dates() {
    let good = json!({"date": "2026-03-01T10:00:00Z"});
    assert!(parse_date_ms(&good) > 0);

    let bad = json!({"date": "yesterday"});
    assert_eq!(parse_date_ms(&bad), 0);

    let missing = json!({});
    assert_eq!(parse_date_ms(&missing), 0);
}

#[test]
fn item_ids_resolve_per_kind() {
    use mendarr_core::ArrKind;
    let record = json!({"movieId": 3, "seriesId": 4, "id": 5});
    assert_eq!(item_id_of(&record, ArrKind::Movies), Some(3));
    assert_eq!(item_id_of(&record, ArrKind::Series), Some(4));

    let only_id = json!({"id": 5});
    assert_eq!(item_id_of(&only_id, ArrKind::Movies), Some(5));
}

#[test]
fn transient_classification() {
    assert!(ArrError::Server { status: 502 }.is_transient());
    assert!(ArrError::Network("reset".into()).is_transient());
    assert!(!ArrError::NotFound.is_transient());
    assert!(!ArrError::Rejected { status: 401 }.is_transient());
    assert!(!ArrError::Unavailable.is_transient());
}
