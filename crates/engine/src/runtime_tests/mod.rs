// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime test harness.
//!
//! The rig plays the daemon's role: events delivered to the runtime are
//! applied to the materialized state first, and events the services emit
//! are pumped back through the same apply-then-handle loop, so tests see
//! exactly the event stream a live process would persist.

use super::*;
use crate::config::RuntimeConfig;
use mendarr_adapters::{ArrError, FakeArrClient, FakeHealthChecker, ItemRef};
use mendarr_core::{
    ArrInstance, ArrKind, CorruptionEventKind, CorruptionKind, DetectionMethod, FakeClock,
    HealthVerdict, InstanceId, ScanPathConfig, ScanPathId, ScheduleConfig, ScheduleId,
};
use std::path::PathBuf;
use std::time::Duration;

mod detection;
mod monitor;
mod rescan;
mod scan;
mod schedule;
mod verify;

pub(crate) struct TestRig {
    pub runtime: Arc<Runtime<FakeHealthChecker, FakeArrClient, FakeClock>>,
    pub state: Arc<Mutex<MaterializedState>>,
    pub health: FakeHealthChecker,
    pub arr: FakeArrClient,
    pub clock: FakeClock,
    pub tx: mpsc::Sender<Event>,
    pub rx: mpsc::Receiver<Event>,
    pub seq: u64,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig {
            progress_every_files: 1000,
            progress_every: Duration::from_secs(3600),
            download_progress_every: Duration::ZERO,
            ..RuntimeConfig::default()
        })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let health = FakeHealthChecker::new();
        let arr = FakeArrClient::new();
        let clock = FakeClock::new();
        let (tx, rx) = mpsc::channel(256);

        let runtime = Arc::new(Runtime::new(
            RuntimeDeps {
                health: health.clone(),
                arr: arr.clone(),
                state: Arc::clone(&state),
            },
            clock.clone(),
            config,
            tx.clone(),
        ));

        Self {
            runtime,
            state,
            health,
            arr,
            clock,
            tx,
            rx,
            seq: 0,
        }
    }

    /// A movies scan path rooted at `local_root`, fast verification knobs.
    pub fn movies_path(local_root: impl Into<PathBuf>) -> ScanPathConfig {
        ScanPathConfig {
            id: ScanPathId::new("movies"),
            local_root: local_root.into(),
            remote_root: PathBuf::from("/movies"),
            instance_id: InstanceId::new("radarr"),
            enabled: true,
            auto_remediate: true,
            dry_run: false,
            detection_method: DetectionMethod::Quick,
            max_retries: 3,
            verification_timeout_secs: 3600,
            verification_interval_secs: 1,
        }
    }

    pub fn radarr() -> ArrInstance {
        ArrInstance {
            id: InstanceId::new("radarr"),
            kind: ArrKind::Movies,
            base_url: "http://arr.example:7878".to_string(),
            api_key: "key".to_string(),
            enabled: true,
        }
    }

    pub fn nightly_schedule(cron: &str) -> ScheduleConfig {
        ScheduleConfig {
            id: ScheduleId::new("nightly"),
            scan_path_id: ScanPathId::new("movies"),
            cron: cron.to_string(),
            enabled: true,
        }
    }

    /// Apply an event to state without dispatching handlers (seeding
    /// history, as WAL replay does on startup).
    pub fn seed(&mut self, event: Event) {
        self.seq += 1;
        let at = self.clock.epoch_ms();
        self.state.lock().apply(self.seq, at, &event);
    }

    /// Seed with an explicit timestamp (for stall scenarios).
    pub fn seed_at(&mut self, at_ms: u64, event: Event) {
        self.seq += 1;
        self.state.lock().apply(self.seq, at_ms, &event);
    }

    /// Deliver an event the way the daemon loop does: apply, then handle.
    /// Handler results are re-injected into the channel for pumping.
    pub async fn deliver(&mut self, event: Event) {
        self.seq += 1;
        let at = self.clock.epoch_ms();
        self.state.lock().apply(self.seq, at, &event);
        let results = self
            .runtime
            .handle_event(self.seq, &event)
            .await
            .expect("handle_event");
        for result in results {
            self.tx.send(result).await.expect("re-inject");
        }
    }

    /// Pump one emitted event through apply + handle. `None` when nothing
    /// arrives within the (virtual) timeout.
    pub async fn pump(&mut self) -> Option<Event> {
        let event = tokio::time::timeout(Duration::from_secs(10), self.rx.recv())
            .await
            .ok()??;
        self.seq += 1;
        let at = self.clock.epoch_ms();
        self.state.lock().apply(self.seq, at, &event);
        let results = self
            .runtime
            .handle_event(self.seq, &event)
            .await
            .expect("handle_event");
        for result in results {
            self.tx.send(result).await.expect("re-inject");
        }
        Some(event)
    }

    /// Pump until an event satisfies the predicate, collecting everything
    /// seen along the way (the matching event included).
    pub async fn pump_until(&mut self, pred: impl Fn(&Event) -> bool) -> Vec<Event> {
        let mut seen = Vec::new();
        for _ in 0..500 {
            let Some(event) = self.pump().await else {
                panic!("event stream went quiet before the expected event; saw: {seen:#?}");
            };
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
        panic!("expected event never arrived; saw: {seen:#?}");
    }

    /// Assert the stream is quiet (no event within the virtual timeout).
    pub async fn assert_quiet(&mut self) {
        if let Some(event) = self.pump().await {
            panic!("expected quiet stream, got {event:?}");
        }
    }

    /// The corruption-lifecycle kinds of one aggregate, in order.
    pub fn aggregate_kinds(&self, id: &str) -> Vec<CorruptionEventKind> {
        self.state
            .lock()
            .read_aggregate(id)
            .iter()
            .filter_map(|stored| stored.event.corruption_kind())
            .collect()
    }

    /// The single corruption aggregate id in the state (panics otherwise).
    pub fn sole_corruption_id(&self) -> String {
        let state = self.state.lock();
        assert_eq!(
            state.corruptions.len(),
            1,
            "expected exactly one aggregate, found {}",
            state.corruptions.len()
        );
        state.corruptions.keys().next().cloned().unwrap_or_default()
    }
}

/// A seeded happy-path rig: movies path + instance + one tracked item.
pub(crate) fn seeded_rig(local_root: impl Into<PathBuf>) -> TestRig {
    let mut rig = TestRig::new();
    rig.seed(Event::ScanPathConfigured {
        config: TestRig::movies_path(local_root),
    });
    rig.seed(Event::ArrInstanceConfigured {
        instance: TestRig::radarr(),
    });
    rig
}

pub(crate) fn detection_for(path: impl Into<PathBuf>) -> Event {
    Event::CorruptionDetected {
        id: CorruptionId::new("c-1"),
        file_path: path.into(),
        scan_path_id: ScanPathId::new("movies"),
        corruption_type: CorruptionKind::VideoStream,
        detail: "decode error".to_string(),
    }
}

pub(crate) fn item(item_id: u64, file_id: u64) -> ItemRef {
    ItemRef {
        item_id,
        file_id,
        title: "A Movie".to_string(),
    }
}

pub(crate) fn transient() -> ArrError {
    ArrError::Server { status: 502 }
}
