// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn first_attempt_has_no_delay() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(0), Duration::ZERO);
}

#[test]
fn delays_double_from_the_base() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
}

#[test]
fn delays_cap_at_max() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(30), Duration::from_secs(5));
}

#[test]
fn attempts_exhaust_at_the_configured_count() {
    let policy = RetryPolicy {
        max_attempts: 3,
        ..Default::default()
    };
    assert!(!policy.attempts_exhausted(0));
    assert!(!policy.attempts_exhausted(1));
    assert!(policy.attempts_exhausted(2));
}
