// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn burst_is_available_immediately() {
    let now = Instant::now();
    let mut bucket = TokenBucket::new(2.0, 5, now);

    for _ in 0..5 {
        assert!(bucket.try_acquire(now).is_ok());
    }
    assert!(bucket.try_acquire(now).is_err());
}

#[test]
fn tokens_refill_at_the_configured_rate() {
    let now = Instant::now();
    let mut bucket = TokenBucket::new(2.0, 2, now);

    bucket.try_acquire(now).unwrap();
    bucket.try_acquire(now).unwrap();
    assert!(bucket.try_acquire(now).is_err());

    // 2 rps → one token after 500ms
    let later = now + Duration::from_millis(500);
    assert!(bucket.try_acquire(later).is_ok());
    assert!(bucket.try_acquire(later).is_err());
}

#[test]
fn wait_hint_matches_the_deficit() {
    let now = Instant::now();
    let mut bucket = TokenBucket::new(4.0, 1, now);
    bucket.try_acquire(now).unwrap();

    let wait = bucket.try_acquire(now).unwrap_err();
    // One token at 4 rps is 250ms away
    assert!(wait >= Duration::from_millis(240) && wait <= Duration::from_millis(260));
}

#[test]
fn refill_never_exceeds_capacity() {
    let now = Instant::now();
    let mut bucket = TokenBucket::new(100.0, 3, now);

    let much_later = now + Duration::from_secs(60);
    assert_eq!(bucket.available(much_later), 3.0);
}

#[test]
fn call_storm_is_bounded_to_rps_plus_burst_per_second() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(5.0, 10, start);

    // Hammer the bucket for exactly one second of simulated time
    let mut admitted = 0;
    for ms in 0..1000 {
        let now = start + Duration::from_millis(ms);
        while bucket.try_acquire(now).is_ok() {
            admitted += 1;
        }
    }

    assert!(admitted <= 15, "admitted {admitted} > rps + burst");
}
