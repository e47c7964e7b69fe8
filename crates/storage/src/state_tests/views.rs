// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn terminalize(state: &mut MaterializedState, seq: u64, id: &str, event: Event) -> u64 {
    apply_all(state, seq, &[detection(id), event])
}

#[test]
fn corruption_status_reflects_the_fold() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            Event::RemediationFailed {
                id: CorruptionId::new("c-1"),
                error: "502 from manager".to_string(),
            },
        ],
    );

    let status = state.corruption_status("c-1").unwrap();
    assert_eq!(status.retry_count, 1);
    assert_eq!(status.last_error.as_deref(), Some("502 from manager"));
    assert_eq!(status.file_path, PathBuf::from("/media/movies/c-1.mkv"));
    assert!(state.corruption_status("missing").is_none());
}

#[test]
fn dashboard_partitions_by_state_class() {
    let mut state = MaterializedState::default();
    let mut seq = 1;

    // active, freshly detected
    seq = apply_all(&mut state, seq, &[detection("c-active")]);
    // in progress (subset of active)
    seq = apply_all(
        &mut state,
        seq,
        &[
            detection("c-progress"),
            Event::RemediationStarted {
                id: CorruptionId::new("c-progress"),
                item_id: 1,
                file_id: 1,
                instance_id: InstanceId::new("radarr"),
            },
        ],
    );
    // resolved
    seq = terminalize(
        &mut state,
        seq,
        "c-resolved",
        Event::VerificationSuccess {
            id: CorruptionId::new("c-resolved"),
        },
    );
    // orphaned
    seq = terminalize(
        &mut state,
        seq,
        "c-orphaned",
        Event::MaxRetriesReached {
            id: CorruptionId::new("c-orphaned"),
            retry_count: 3,
        },
    );
    // manual intervention
    seq = terminalize(
        &mut state,
        seq,
        "c-manual",
        Event::ImportBlocked {
            id: CorruptionId::new("c-manual"),
            reason: "item gone".to_string(),
        },
    );
    // ignored: excluded from every count
    terminalize(
        &mut state,
        seq,
        "c-ignored",
        Event::CorruptionIgnored {
            id: CorruptionId::new("c-ignored"),
        },
    );

    let stats = state.dashboard_stats();
    assert_eq!(
        stats,
        DashboardStats {
            total_corruptions: 5,
            active_corruptions: 2,
            resolved_corruptions: 1,
            orphaned_corruptions: 1,
            in_progress: 1,
            manual_intervention_required: 1,
        }
    );
}

#[test]
fn in_progress_matches_the_kind_list() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            Event::SearchCompleted {
                id: CorruptionId::new("c-1"),
            },
        ],
    );

    let stats = state.dashboard_stats();
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.active_corruptions, 1);
}

#[test]
fn happy_path_increments_resolved() {
    let mut state = MaterializedState::default();
    let id = CorruptionId::new("c-1");
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            Event::RemediationStarted {
                id: id.clone(),
                item_id: 5,
                file_id: 6,
                instance_id: InstanceId::new("radarr"),
            },
            Event::DeletionCompleted { id: id.clone() },
            Event::SearchStarted { id: id.clone() },
            Event::SearchCompleted { id: id.clone() },
            Event::DownloadQueued { id: id.clone() },
            Event::DownloadProgress {
                id: id.clone(),
                percent: Some(50),
            },
            Event::VerificationStarted {
                id: id.clone(),
                file_path: PathBuf::from("/media/movies/c-1.mkv"),
            },
            Event::VerificationSuccess { id },
        ],
    );

    assert_eq!(state.dashboard_stats().resolved_corruptions, 1);
    assert_eq!(state.dashboard_stats().active_corruptions, 0);
}
