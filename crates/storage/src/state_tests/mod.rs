// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{
    ArrKind, CorruptionId, CorruptionKind, DetectionMethod, InstanceId, ScanId, ScanPathId,
    ScheduleId,
};
use std::path::PathBuf;

mod config;
mod corruption;
mod prune;
mod rescan;
mod scans;
mod views;

/// Shared helpers for the state test modules.

pub(super) fn detection(id: &str) -> Event {
    Event::CorruptionDetected {
        id: CorruptionId::new(id),
        file_path: PathBuf::from(format!("/media/movies/{id}.mkv")),
        scan_path_id: ScanPathId::new("movies"),
        corruption_type: CorruptionKind::VideoStream,
        detail: "decode error".to_string(),
    }
}

pub(super) fn scan_path_config(id: &str) -> ScanPathConfig {
    ScanPathConfig {
        id: ScanPathId::new(id),
        local_root: PathBuf::from("/mnt/media").join(id),
        remote_root: PathBuf::from("/").join(id),
        instance_id: InstanceId::new("radarr"),
        enabled: true,
        auto_remediate: true,
        dry_run: false,
        detection_method: DetectionMethod::Quick,
        max_retries: 3,
        verification_timeout_secs: 60,
        verification_interval_secs: 1,
    }
}

pub(super) fn arr_instance(id: &str) -> ArrInstance {
    ArrInstance {
        id: InstanceId::new(id),
        kind: ArrKind::Movies,
        base_url: "http://arr.example:7878".to_string(),
        api_key: "enc:abc".to_string(),
        enabled: true,
    }
}

pub(super) fn schedule(id: &str, cron: &str) -> ScheduleConfig {
    ScheduleConfig {
        id: ScheduleId::new(id),
        scan_path_id: ScanPathId::new("movies"),
        cron: cron.to_string(),
        enabled: true,
    }
}

/// Apply events with sequential ids starting at `start`, 10ms apart.
pub(super) fn apply_all(state: &mut MaterializedState, start: u64, events: &[Event]) -> u64 {
    let mut seq = start;
    for event in events {
        state.apply(seq, seq * 10, event);
        seq += 1;
    }
    seq
}
