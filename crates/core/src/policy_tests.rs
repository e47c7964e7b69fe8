// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config() -> ScanPathConfig {
    ScanPathConfig {
        id: ScanPathId::new("movies"),
        local_root: "/mnt/media/movies".into(),
        remote_root: "/movies".into(),
        instance_id: InstanceId::new("radarr"),
        enabled: true,
        auto_remediate: true,
        dry_run: false,
        detection_method: DetectionMethod::Quick,
        max_retries: 3,
        verification_timeout_secs: 120,
        verification_interval_secs: 5,
    }
}

#[test]
fn remediation_allowed_for_enabled_auto_paths() {
    assert!(config().remediation_allowed(false));
}

#[test]
fn dry_run_blocks_remediation() {
    let mut c = config();
    c.dry_run = true;
    assert!(!c.remediation_allowed(false));
}

#[test]
fn global_dry_run_blocks_remediation() {
    assert!(!config().remediation_allowed(true));
}

#[test]
fn disabled_or_manual_paths_block_remediation() {
    let mut c = config();
    c.enabled = false;
    assert!(!c.remediation_allowed(false));

    let mut c = config();
    c.auto_remediate = false;
    assert!(!c.remediation_allowed(false));
}

#[test]
fn durations_come_from_seconds_fields() {
    let c = config();
    assert_eq!(c.verification_timeout(), Duration::from_secs(120));
    assert_eq!(c.verification_interval(), Duration::from_secs(5));
}

#[test]
fn config_deserializes_with_defaults() {
    let toml = r#"
        id = "tv"
        local_root = "/mnt/media/tv"
        remote_root = "/tv"
        instance_id = "sonarr"
        enabled = true
        auto_remediate = false
    "#;
    let c: ScanPathConfig = toml::from_str(toml).unwrap();
    assert_eq!(c.max_retries, 3);
    assert_eq!(c.detection_method, DetectionMethod::Quick);
    assert!(!c.dry_run);
    assert_eq!(c.verification_timeout_secs, 6 * 60 * 60);
}
