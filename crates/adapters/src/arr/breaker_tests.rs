// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const COOLDOWN: Duration = Duration::from_secs(30);

#[test]
fn stays_closed_below_threshold() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(3, COOLDOWN);

    breaker.record_failure(now);
    breaker.record_failure(now);
    assert!(!breaker.is_open());
    assert!(breaker.allow(now));
}

#[test]
fn opens_at_consecutive_failure_threshold() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(3, COOLDOWN);

    for _ in 0..3 {
        breaker.record_failure(now);
    }
    assert!(breaker.is_open());
    assert!(!breaker.allow(now));
}

#[test]
fn success_resets_the_failure_run() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(3, COOLDOWN);

    breaker.record_failure(now);
    breaker.record_failure(now);
    breaker.record_success();
    breaker.record_failure(now);
    breaker.record_failure(now);
    assert!(!breaker.is_open());
}

#[test]
fn half_open_admits_one_probe_after_cooldown() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(1, COOLDOWN);
    breaker.record_failure(now);
    assert!(!breaker.allow(now + Duration::from_secs(1)));

    let after = now + COOLDOWN;
    assert!(breaker.allow(after), "probe admitted after cooldown");
    assert!(!breaker.allow(after), "only one probe at a time");
}

#[test]
fn successful_probe_closes_the_breaker() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(1, COOLDOWN);
    breaker.record_failure(now);

    let after = now + COOLDOWN;
    assert!(breaker.allow(after));
    breaker.record_success();
    assert!(!breaker.is_open());
    assert!(breaker.allow(after));
}

#[test]
fn failed_probe_reopens_with_fresh_cooldown() {
    let now = Instant::now();
    let mut breaker = CircuitBreaker::new(1, COOLDOWN);
    breaker.record_failure(now);

    let probe_at = now + COOLDOWN;
    assert!(breaker.allow(probe_at));
    breaker.record_failure(probe_at);

    // Still open within the new cooldown window
    assert!(!breaker.allow(probe_at + Duration::from_secs(10)));
    // Admits the next probe after a full cooldown from the failed probe
    assert!(breaker.allow(probe_at + COOLDOWN));
}
