// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn backoff_doubles_and_caps() {
    assert_eq!(rescan_backoff(0), Duration::from_secs(60));
    assert_eq!(rescan_backoff(1), Duration::from_secs(120));
    assert_eq!(rescan_backoff(2), Duration::from_secs(240));
    // Capped at one hour
    assert_eq!(rescan_backoff(6), Duration::from_secs(3600));
    assert_eq!(rescan_backoff(100), Duration::from_secs(3600));
}

#[test]
fn due_when_retry_time_passed() {
    let entry = PendingRescan {
        file_path: "/media/b.mkv".into(),
        scan_path_id: ScanPathId::new("movies"),
        reason: "mount_lost".to_string(),
        attempts: 0,
        next_retry_at_ms: 1000,
    };
    assert!(!entry.is_due(999));
    assert!(entry.is_due(1000));
    assert!(entry.is_due(2000));
}

#[test]
fn attempts_exhaust_at_the_bound() {
    let mut entry = PendingRescan {
        file_path: "/media/b.mkv".into(),
        scan_path_id: ScanPathId::new("movies"),
        reason: "mount_lost".to_string(),
        attempts: MAX_RESCAN_ATTEMPTS - 1,
        next_retry_at_ms: 0,
    };
    assert!(!entry.attempts_exhausted());
    entry.attempts += 1;
    assert!(entry.attempts_exhausted());
}
