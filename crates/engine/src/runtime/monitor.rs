// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor: retry ceilings and stall detection.
//!
//! The monitor keeps no state of its own; everything it needs is in the
//! derived views. Ceilings are enforced after every failure event, and a
//! periodic tick re-prompts aggregates whose story has gone quiet.

use super::Runtime;
use mendarr_adapters::{ArrClient, HealthChecker};
use mendarr_core::{Clock, CorruptionEventKind, CorruptionId, CorruptionStatus, Event};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// Retry ceiling for one aggregate: the path's own limit, or the
    /// process default when the path is gone or unset.
    fn max_retries_for(&self, status: &CorruptionStatus) -> u32 {
        self.lock_state(|state| {
            state
                .scan_path(status.scan_path_id.as_str())
                .map(|policy| policy.max_retries)
        })
        .unwrap_or(self.config.default_max_retries)
    }

    /// After a failure event: emit the terminal ceiling event when the
    /// aggregate has used up its retries.
    pub(crate) fn enforce_retry_ceiling(&self, id: &CorruptionId) -> Vec<Event> {
        let Some(status) = self.lock_state(|state| state.corruption_status(id.as_str())) else {
            return Vec::new();
        };
        if status.is_terminal() {
            return Vec::new();
        }

        let max = self.max_retries_for(&status);
        if status.retry_count >= max {
            warn!(
                corruption_id = %id,
                retries = status.retry_count,
                max,
                "retry ceiling reached"
            );
            return vec![Event::MaxRetriesReached {
                id: id.clone(),
                retry_count: status.retry_count,
            }];
        }
        Vec::new()
    }

    /// Periodic stall pass over every non-terminal aggregate.
    ///
    /// Aggregates idle past the stall threshold are either finalized
    /// (retries exhausted) or re-prompted: waiters are re-armed when a file
    /// is awaited, remediation is re-dispatched otherwise.
    pub fn monitor_tick(self: &Arc<Self>) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let threshold_ms = self.config.stall_threshold.as_millis() as u64;

        let stalled: Vec<CorruptionStatus> = self.lock_state(|state| {
            state
                .corruption_statuses()
                .into_iter()
                .filter(|status| {
                    !status.is_terminal()
                        && now_ms.saturating_sub(status.last_updated_ms) >= threshold_ms
                })
                .collect()
        });

        let mut events = Vec::new();
        for status in stalled {
            let max = self.max_retries_for(&status);
            if status.retry_count >= max {
                info!(
                    corruption_id = %status.id,
                    retries = status.retry_count,
                    "stalled aggregate out of retries"
                );
                events.push(Event::MaxRetriesReached {
                    id: status.id.clone(),
                    retry_count: status.retry_count,
                });
                continue;
            }

            if status.state.awaits_verification() || status.state == CorruptionEventKind::VerificationFailed
            {
                debug!(corruption_id = %status.id, state = %status.state, "re-arming stalled verification");
                self.arm_verifier(&status.id);
                continue;
            }

            match status.state {
                CorruptionEventKind::CorruptionDetected
                | CorruptionEventKind::RemediationFailed => {
                    let policy = self.lock_state(|state| {
                        state.scan_path(status.scan_path_id.as_str()).cloned()
                    });
                    if let Some(policy) = policy {
                        if policy.remediation_allowed(self.config.global_dry_run) {
                            debug!(corruption_id = %status.id, "re-dispatching stalled remediation");
                            self.start_remediation(
                                status.id.clone(),
                                status.file_path.clone(),
                                policy,
                                false,
                            );
                        }
                    }
                }
                // Mid-remediation stall: the item is known, resume at the
                // search step so the delete never runs twice
                CorruptionEventKind::RemediationStarted
                | CorruptionEventKind::DeletionStarted
                | CorruptionEventKind::DeletionCompleted
                | CorruptionEventKind::DeletionFailed
                | CorruptionEventKind::SearchStarted
                | CorruptionEventKind::SearchFailed => {
                    let policy = self.lock_state(|state| {
                        state.scan_path(status.scan_path_id.as_str()).cloned()
                    });
                    if let Some(policy) = policy {
                        if policy.remediation_allowed(self.config.global_dry_run) {
                            debug!(corruption_id = %status.id, state = %status.state, "resuming stalled remediation at search");
                            self.start_remediation(
                                status.id.clone(),
                                status.file_path.clone(),
                                policy,
                                true,
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        events
    }
}
