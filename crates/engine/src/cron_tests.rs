// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use yare::parameterized;

fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> u64 {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .unwrap()
        .timestamp_millis() as u64
}

#[parameterized(
    every_minute = { "* * * * *" },
    daily = { "0 3 * * *" },
    steps = { "*/15 * * * *" },
    lists = { "0,30 6,18 * * *" },
    ranges = { "0 9-17 * * 1-5" },
    range_step = { "0 0 1-31/2 * *" },
)]
fn valid_expressions_parse(expr: &str) {
    assert!(CronExpr::parse(expr).is_ok(), "{expr}");
}

#[parameterized(
    too_few = { "* * * *" },
    too_many = { "* * * * * *" },
    out_of_range_minute = { "60 * * * *" },
    out_of_range_hour = { "* 24 * * *" },
    out_of_range_dow = { "* * * * 7" },
    garbage = { "a b c d e" },
    zero_step = { "*/0 * * * *" },
    inverted_range = { "30-10 * * * *" },
)]
fn invalid_expressions_fail(expr: &str) {
    assert!(CronExpr::parse(expr).is_err(), "{expr}");
}

#[test]
fn every_minute_fires_on_the_next_minute() {
    let cron = CronExpr::parse("* * * * *").unwrap();
    let after = ms(2026, 3, 1, 10, 0) + 30_000; // 10:00:30
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 1, 10, 1)));
}

#[test]
fn daily_schedule_rolls_to_the_next_day() {
    let cron = CronExpr::parse("0 3 * * *").unwrap();
    let after = ms(2026, 3, 1, 10, 0);
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 2, 3, 0)));
}

#[test]
fn daily_schedule_fires_later_the_same_day() {
    let cron = CronExpr::parse("0 23 * * *").unwrap();
    let after = ms(2026, 3, 1, 10, 0);
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 1, 23, 0)));
}

#[test]
fn step_schedule_quarter_hours() {
    let cron = CronExpr::parse("*/15 * * * *").unwrap();
    let after = ms(2026, 3, 1, 10, 20);
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 1, 10, 30)));
}

#[test]
fn weekday_field_matches() {
    // 2026-03-01 is a Sunday
    let cron = CronExpr::parse("0 12 * * 0").unwrap();
    let after = ms(2026, 2, 27, 0, 0);
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 1, 12, 0)));
}

#[test]
fn restricted_dom_and_dow_fire_on_either() {
    // Classic cron: day-of-month 15 OR Sunday
    let cron = CronExpr::parse("0 0 15 * 0").unwrap();
    let after = ms(2026, 3, 2, 0, 0); // Monday the 2nd
    // Sunday the 8th comes before the 15th
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 3, 8, 0, 0)));
}

#[test]
fn month_boundary_rolls_over() {
    let cron = CronExpr::parse("0 0 1 * *").unwrap();
    let after = ms(2026, 3, 2, 0, 0);
    assert_eq!(cron.next_after_ms(after), Some(ms(2026, 4, 1, 0, 0)));
}

#[test]
fn next_fire_is_strictly_after_the_anchor() {
    let cron = CronExpr::parse("0 3 * * *").unwrap();
    let exactly = ms(2026, 3, 1, 3, 0);
    assert_eq!(cron.next_after_ms(exactly), Some(ms(2026, 3, 2, 3, 0)));
}

#[test]
fn impossible_schedule_returns_none() {
    // February 30th never exists
    let cron = CronExpr::parse("0 0 30 2 *").unwrap();
    assert_eq!(cron.next_after_ms(ms(2026, 1, 1, 0, 0)), None);
}
