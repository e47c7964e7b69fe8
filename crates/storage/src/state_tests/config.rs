// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn scan_path_configured_upserts() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ScanPathConfigured {
            config: scan_path_config("movies"),
        },
    );
    assert!(state.scan_path("movies").is_some());

    let mut updated = scan_path_config("movies");
    updated.dry_run = true;
    state.apply(2, 20, &Event::ScanPathConfigured { config: updated });

    assert!(state.scan_path("movies").unwrap().dry_run);
    assert_eq!(state.scan_paths.len(), 1);
}

#[test]
fn scan_path_removed_drops_the_config() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ScanPathConfigured {
            config: scan_path_config("movies"),
        },
    );
    state.apply(
        2,
        20,
        &Event::ScanPathRemoved {
            id: ScanPathId::new("movies"),
        },
    );
    assert!(state.scan_path("movies").is_none());
}

#[test]
fn arr_instance_configured_upserts() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ArrInstanceConfigured {
            instance: arr_instance("radarr"),
        },
    );
    assert_eq!(state.arr_instances["radarr"].kind, ArrKind::Movies);
}

#[test]
fn schedule_upsert_preserves_fire_history() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ScheduleAdded {
            schedule: schedule("nightly", "0 3 * * *"),
        },
    );
    state.apply(
        2,
        20,
        &Event::ScheduleFired {
            id: ScheduleId::new("nightly"),
            fired_at_ms: 5000,
        },
    );

    // Re-configure with a different cron; the fire history survives
    state.apply(
        3,
        30,
        &Event::ScheduleAdded {
            schedule: schedule("nightly", "0 4 * * *"),
        },
    );

    let record = &state.schedules["nightly"];
    assert_eq!(record.config.cron, "0 4 * * *");
    assert_eq!(record.last_fired_at_ms, Some(5000));
}

#[test]
fn schedule_fired_keeps_the_latest_time() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ScheduleAdded {
            schedule: schedule("nightly", "0 3 * * *"),
        },
    );
    state.apply(
        2,
        20,
        &Event::ScheduleFired {
            id: ScheduleId::new("nightly"),
            fired_at_ms: 9000,
        },
    );
    // Stale (replayed) fire time does not move the clock backwards
    state.apply(
        3,
        30,
        &Event::ScheduleFired {
            id: ScheduleId::new("nightly"),
            fired_at_ms: 5000,
        },
    );
    assert_eq!(state.schedules["nightly"].last_fired_at_ms, Some(9000));
}

#[test]
fn settings_are_a_plain_kv_table() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::SettingUpdated {
            key: "secret_migration".to_string(),
            value: "done".to_string(),
        },
    );
    assert_eq!(state.settings["secret_migration"], "done");
}

#[test]
fn path_mapper_is_derived_from_scan_paths() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::ScanPathConfigured {
            config: scan_path_config("movies"),
        },
    );

    let mapper = state.path_mapper();
    let mapped = mapper.to_local(
        std::path::Path::new("/movies/a/a.mkv"),
        &InstanceId::new("radarr"),
    );
    assert_eq!(
        mapped.into_path(),
        PathBuf::from("/mnt/media/movies/a/a.mkv")
    );
}
