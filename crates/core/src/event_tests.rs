// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::health::CorruptionKind;
use crate::scan::ScanFileStatus;

fn detection() -> Event {
    Event::CorruptionDetected {
        id: CorruptionId::new("c-1"),
        file_path: PathBuf::from("/media/a.mkv"),
        scan_path_id: ScanPathId::new("movies"),
        corruption_type: CorruptionKind::Truncated,
        detail: "short read".to_string(),
    }
}

#[test]
fn events_serialize_with_type_tag() {
    let json = serde_json::to_value(detection()).unwrap();
    assert_eq!(json["type"], "corruption:detected");
    assert_eq!(json["corruption_type"], "truncated");
}

#[test]
fn events_roundtrip_through_json() {
    let events = vec![
        detection(),
        Event::RemediationStarted {
            id: CorruptionId::new("c-1"),
            item_id: 9,
            file_id: 4,
            instance_id: InstanceId::new("radarr"),
        },
        Event::ScanQueued {
            scan_id: ScanId(3),
            scan_path_id: ScanPathId::new("movies"),
            root: PathBuf::from("/media"),
        },
        Event::ScanFileRecorded {
            scan_id: ScanId(3),
            file_path: PathBuf::from("/media/a.mkv"),
            status: ScanFileStatus::Healthy,
            size: 1024,
            modified_ms: 77,
        },
        Event::RescanQueued {
            file_path: PathBuf::from("/media/b.mkv"),
            scan_path_id: ScanPathId::new("movies"),
            reason: "mount_lost".to_string(),
            attempts: 1,
            next_retry_at_ms: 5000,
        },
        Event::Shutdown,
    ];

    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

#[test]
fn optional_fields_are_omitted_when_empty() {
    let json = serde_json::to_value(Event::DownloadProgress {
        id: CorruptionId::new("c-1"),
        percent: None,
    })
    .unwrap();
    assert!(json.get("percent").is_none());

    let json = serde_json::to_value(Event::ScanStarted {
        scan_id: ScanId(1),
        resumed: false,
    })
    .unwrap();
    assert!(json.get("resumed").is_none());
}

#[test]
fn corruption_id_accessor_covers_corruption_events() {
    assert_eq!(
        detection().corruption_id(),
        Some(&CorruptionId::new("c-1"))
    );
    assert_eq!(
        Event::VerificationSuccess {
            id: CorruptionId::new("c-2")
        }
        .corruption_id(),
        Some(&CorruptionId::new("c-2"))
    );
    assert_eq!(Event::Shutdown.corruption_id(), None);
    assert_eq!(
        Event::ScanCancelled { scan_id: ScanId(1) }.corruption_id(),
        None
    );
}

#[test]
fn scan_id_accessor_covers_scan_events() {
    assert_eq!(
        Event::ScanPaused { scan_id: ScanId(7) }.scan_id(),
        Some(ScanId(7))
    );
    assert_eq!(detection().scan_id(), None);
}

#[test]
fn corruption_kind_maps_every_lifecycle_event() {
    use crate::corruption::CorruptionEventKind;
    assert_eq!(
        detection().corruption_kind(),
        Some(CorruptionEventKind::CorruptionDetected)
    );
    assert_eq!(
        Event::ManuallyRemoved {
            id: CorruptionId::new("c-1")
        }
        .corruption_kind(),
        Some(CorruptionEventKind::ManuallyRemoved)
    );
    assert_eq!(
        Event::ScanRequested {
            scan_path_id: ScanPathId::new("movies"),
            root: None
        }
        .corruption_kind(),
        None
    );
}

#[test]
fn error_detail_surfaces_failure_payloads() {
    let event = Event::VerificationFailed {
        id: CorruptionId::new("c-1"),
        error: "timeout".to_string(),
    };
    assert_eq!(event.error_detail(), Some("timeout"));

    let event = Event::ImportBlocked {
        id: CorruptionId::new("c-1"),
        reason: "not found".to_string(),
    };
    assert_eq!(event.error_detail(), Some("not found"));

    assert_eq!(detection().error_detail(), None);
}

#[test]
fn log_summary_is_single_line() {
    for event in [
        detection(),
        Event::ScanProgress {
            scan_id: ScanId(2),
            files_seen: 10,
            files_scanned: 8,
            corruptions_found: 1,
        },
        Event::SettingUpdated {
            key: "k".to_string(),
            value: "v".to_string(),
        },
    ] {
        let summary = event.log_summary();
        assert!(!summary.is_empty());
        assert!(!summary.contains('\n'));
    }
}

#[test]
fn older_records_without_attempts_still_parse() {
    let json = r#"{"type":"rescan:queued","file_path":"/m/x.mkv","scan_path_id":"movies","reason":"io","next_retry_at_ms":1}"#;
    let event: Event = serde_json::from_str(json).unwrap();
    assert!(matches!(event, Event::RescanQueued { attempts: 0, .. }));
}
