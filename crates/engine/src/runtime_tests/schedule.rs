// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler ticks: cron firing, missed-fire collapse, runtime changes,
//! and the startup recovery pass.

use super::*;
use mendarr_core::{ScanId, ScanStatus};

const MINUTE_MS: u64 = 60_000;

#[tokio::test(start_paused = true)]
async fn schedule_fires_at_its_cron_instant() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(Event::ScheduleAdded {
        schedule: TestRig::nightly_schedule("* * * * *"),
    });

    // First tick arms the schedule; nothing fires yet
    assert!(rig.runtime.scheduler_tick().is_empty());

    // Cross the next minute boundary
    rig.clock.advance(Duration::from_millis(MINUTE_MS + 1_000));
    let events = rig.runtime.scheduler_tick();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::ScanRequested { .. }));
    assert!(matches!(events[1], Event::ScheduleFired { .. }));
}

#[tokio::test(start_paused = true)]
async fn missed_fires_collapse_to_one() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(Event::ScheduleAdded {
        schedule: TestRig::nightly_schedule("* * * * *"),
    });
    // Durable fire history: last fired long ago (downtime)
    rig.seed(Event::ScheduleFired {
        id: ScheduleId::new("nightly"),
        fired_at_ms: rig.clock.epoch_ms(),
    });
    rig.clock.advance(Duration::from_millis(90 * MINUTE_MS));

    let events = rig.runtime.scheduler_tick();
    let requests = events
        .iter()
        .filter(|e| matches!(e, Event::ScanRequested { .. }))
        .count();
    assert_eq!(requests, 1, "90 missed minutes still fire once");

    // Applying the fire moves the anchor; the next tick is quiet
    for event in events {
        rig.seed(event);
    }
    assert!(rig.runtime.scheduler_tick().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_schedules_never_fire() {
    let mut rig = seeded_rig("/mnt/media/movies");
    let mut schedule = TestRig::nightly_schedule("* * * * *");
    schedule.enabled = false;
    rig.seed(Event::ScheduleAdded { schedule });

    rig.runtime.scheduler_tick();
    rig.clock.advance(Duration::from_millis(10 * MINUTE_MS));
    assert!(rig.runtime.scheduler_tick().is_empty());
}

#[tokio::test(start_paused = true)]
async fn removed_schedule_is_gone_on_the_next_tick() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(Event::ScheduleAdded {
        schedule: TestRig::nightly_schedule("* * * * *"),
    });
    rig.runtime.scheduler_tick();

    rig.seed(Event::ScheduleRemoved {
        id: ScheduleId::new("nightly"),
    });
    rig.clock.advance(Duration::from_millis(5 * MINUTE_MS));
    assert!(rig.runtime.scheduler_tick().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bad_cron_is_skipped_not_fatal() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(Event::ScheduleAdded {
        schedule: TestRig::nightly_schedule("not a cron"),
    });
    rig.clock.advance(Duration::from_millis(5 * MINUTE_MS));
    assert!(rig.runtime.scheduler_tick().is_empty());
}

#[tokio::test(start_paused = true)]
async fn recovery_resumes_scans_and_rearms_verification() {
    let root = tempfile::TempDir::new().unwrap();
    std::fs::write(root.path().join("a.mkv"), b"bytes").unwrap();
    let mut rig = seeded_rig(root.path());

    // A scan left running by a crash
    rig.seed(Event::ScanQueued {
        scan_id: ScanId(1),
        scan_path_id: ScanPathId::new("movies"),
        root: root.path().to_path_buf(),
    });
    rig.seed(Event::ScanStarted {
        scan_id: ScanId(1),
        resumed: false,
    });
    // An aggregate parked mid-verification
    rig.seed(detection_for(root.path().join("other.mkv")));
    rig.seed(Event::RemediationStarted {
        id: CorruptionId::new("c-1"),
        item_id: 42,
        file_id: 7,
        instance_id: InstanceId::new("radarr"),
    });
    rig.seed(Event::SearchCompleted {
        id: CorruptionId::new("c-1"),
    });

    rig.runtime.recover();

    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;
    assert_eq!(
        rig.state.lock().scans[&1].status,
        ScanStatus::Completed
    );
    assert!(rig.runtime.has_verify_waiter("c-1"));
}
