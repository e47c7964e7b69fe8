// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: cron-driven scan triggering.
//!
//! Schedule records live in the materialized state, so adding, removing
//! or toggling one is an event and the next tick observes it. Fires
//! missed while the process was down collapse to a single immediate fire.

use super::Runtime;
use crate::cron::CronExpr;
use mendarr_adapters::{ArrClient, HealthChecker};
use mendarr_core::{Clock, Event};
use std::sync::Arc;
use tracing::{debug, warn};

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// One scheduler tick (driven every second by the daemon).
    ///
    /// A schedule fires when its next computed fire time after the anchor
    /// (last fire, or the moment the schedule was first seen) has passed.
    /// Several elapsed periods still fire once: the anchor jumps to now.
    pub fn scheduler_tick(self: &Arc<Self>) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let schedules = self.lock_state(|state| {
            state
                .schedules
                .values()
                .map(|record| (record.config.clone(), record.last_fired_at_ms))
                .collect::<Vec<_>>()
        });

        let mut events = Vec::new();
        for (config, last_fired) in schedules {
            if !config.enabled {
                self.schedule_armed_at.lock().remove(config.id.as_str());
                continue;
            }

            let cron = match CronExpr::parse(&config.cron) {
                Ok(cron) => cron,
                Err(e) => {
                    warn!(schedule = %config.id, error = %e, "skipping schedule with bad cron");
                    continue;
                }
            };

            // Anchor: last durable fire, else the moment we first saw the
            // schedule this session (a fresh schedule does not fire
            // immediately, it waits for its next cron instant)
            let anchor = match last_fired {
                Some(at) => at,
                None => {
                    let mut armed = self.schedule_armed_at.lock();
                    *armed.entry(config.id.as_str().to_string()).or_insert(now_ms)
                }
            };

            let Some(next) = cron.next_after_ms(anchor) else {
                warn!(schedule = %config.id, cron = %config.cron, "cron never fires");
                continue;
            };

            if next <= now_ms {
                debug!(
                    schedule = %config.id,
                    scan_path = %config.scan_path_id,
                    "schedule fired"
                );
                events.push(Event::ScanRequested {
                    scan_path_id: config.scan_path_id.clone(),
                    root: None,
                });
                events.push(Event::ScheduleFired {
                    id: config.id.clone(),
                    fired_at_ms: now_ms,
                });
            }
        }
        events
    }
}
