// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn same_version_is_untouched() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 2, "state": {}});
    let migrated = registry.migrate_to(snapshot.clone(), 2).unwrap();
    assert_eq!(migrated, snapshot);
}

#[test]
fn newer_snapshot_is_rejected() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 99, "state": {}});
    let err = registry.migrate_to(snapshot, 2).unwrap_err();
    assert!(matches!(err, MigrationError::TooNew(99, 2)));
}

#[test]
fn missing_version_defaults_to_v1() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"seq": 1, "state": {"scan_paths": {}}});
    let migrated = registry.migrate_to(snapshot, 2).unwrap();
    assert_eq!(migrated["v"], 2);
}

#[test]
fn no_path_errors_cleanly() {
    let registry = MigrationRegistry::empty();
    let snapshot = json!({"v": 1, "state": {}});
    let err = registry.migrate_to(snapshot, 2).unwrap_err();
    assert!(matches!(err, MigrationError::NoPath(1, 2)));
}

#[test]
fn v1_to_v2_adds_dry_run_to_scan_paths() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({
        "v": 1,
        "seq": 10,
        "state": {
            "scan_paths": {
                "movies": {
                    "id": "movies",
                    "local_root": "/mnt/media/movies",
                    "remote_root": "/movies",
                    "instance_id": "radarr",
                    "enabled": true,
                    "auto_remediate": true
                }
            }
        }
    });

    let migrated = registry.migrate_to(snapshot, 2).unwrap();
    assert_eq!(migrated["v"], 2);
    assert_eq!(
        migrated["state"]["scan_paths"]["movies"]["dry_run"],
        serde_json::Value::Bool(false)
    );
}

#[test]
fn v1_to_v2_preserves_an_existing_flag() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({
        "v": 1,
        "state": {
            "scan_paths": {
                "movies": { "dry_run": true }
            }
        }
    });

    let migrated = registry.migrate_to(snapshot, 2).unwrap();
    assert_eq!(
        migrated["state"]["scan_paths"]["movies"]["dry_run"],
        serde_json::Value::Bool(true)
    );
}

#[test]
fn migrations_apply_exactly_once() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 1, "state": {"scan_paths": {}}});

    let once = registry.migrate_to(snapshot, 2).unwrap();
    // A second pass sees v2 and does nothing
    let twice = registry.migrate_to(once.clone(), 2).unwrap();
    assert_eq!(once, twice);
}
