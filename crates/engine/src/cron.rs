// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron expressions for scan schedules.
//!
//! Grammar: `minute hour day-of-month month day-of-week`, each field `*`,
//! a number, a list (`1,15`), a range (`1-5`), or a step (`*/10`, `2-10/2`).
//! When both day fields are restricted, either matching fires the
//! schedule, per classic cron.

use crate::error::EngineError;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};

/// One parsed field: a set of permitted values as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    mask: u64,
    /// True when the field was `*` (relevant for day-of-month/day-of-week)
    any: bool,
}

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        self.mask & (1u64 << value) != 0
    }
}

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: FieldSet,
    hour: FieldSet,
    dom: FieldSet,
    month: FieldSet,
    dow: FieldSet,
}

impl CronExpr {
    /// Parse a 5-field expression.
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let invalid = |reason: &str| EngineError::InvalidCron {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid("expected 5 fields"));
        }

        Ok(Self {
            minute: parse_field(fields[0], 0, 59).map_err(|r| invalid(&r))?,
            hour: parse_field(fields[1], 0, 23).map_err(|r| invalid(&r))?,
            dom: parse_field(fields[2], 1, 31).map_err(|r| invalid(&r))?,
            month: parse_field(fields[3], 1, 12).map_err(|r| invalid(&r))?,
            dow: parse_field(fields[4], 0, 6).map_err(|r| invalid(&r))?,
        })
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        if !self.minute.contains(at.minute())
            || !self.hour.contains(at.hour())
            || !self.month.contains(at.month())
        {
            return false;
        }

        let dom_match = self.dom.contains(at.day());
        let dow_match = self.dow.contains(at.weekday().num_days_from_sunday());

        // Classic cron: both day fields restricted → either may match
        match (self.dom.any, self.dow.any) {
            (true, true) => true,
            (false, true) => dom_match,
            (true, false) => dow_match,
            (false, false) => dom_match || dow_match,
        }
    }

    /// First fire time strictly after `after_ms` (epoch milliseconds).
    ///
    /// Returns `None` only for expressions that can never fire within the
    /// next four years (e.g. February 30th).
    pub fn next_after_ms(&self, after_ms: u64) -> Option<u64> {
        let after = Utc.timestamp_millis_opt(after_ms as i64).single()?;
        // Truncate to the minute, then step forward
        let mut candidate = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))?
            + ChronoDuration::minutes(1);

        // Four years bounds leap-year-only schedules
        let limit = after + ChronoDuration::days(4 * 366);
        while candidate <= limit {
            if self.matches(candidate) {
                return Some(candidate.timestamp_millis().max(0) as u64);
            }
            candidate += ChronoDuration::minutes(1);
        }
        None
    }
}

/// Parse one field into a bitmask over `[min, max]`.
fn parse_field(field: &str, min: u32, max: u32) -> Result<FieldSet, String> {
    let mut mask = 0u64;
    let mut any = true;

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step '{step}'"))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else {
            any = false;
            match range.split_once('-') {
                Some((lo, hi)) => {
                    let lo: u32 = lo.parse().map_err(|_| format!("bad value '{lo}'"))?;
                    let hi: u32 = hi.parse().map_err(|_| format!("bad value '{hi}'"))?;
                    (lo, hi)
                }
                None => {
                    let v: u32 = range.parse().map_err(|_| format!("bad value '{range}'"))?;
                    (v, v)
                }
            }
        };

        if lo < min || hi > max || lo > hi {
            return Err(format!("value out of range {min}-{max}"));
        }

        let mut v = lo;
        while v <= hi {
            mask |= 1u64 << v;
            v += step;
        }

        // `*/n` restricts even though the range is full
        if step != 1 {
            any = false;
        }
    }

    if mask == 0 {
        return Err("empty field".to_string());
    }

    Ok(FieldSet { mask, any })
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
