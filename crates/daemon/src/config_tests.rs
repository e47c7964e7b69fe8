// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let config = DaemonConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.backup_retain, 5);
    assert!(!config.dry_run);
    assert!(config.scan_paths.is_empty());
}

#[test]
fn full_config_parses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mendarr.toml");
    std::fs::write(
        &path,
        r#"
data_dir = "/var/lib/mendarr"
log_level = "debug"
dry_run = true
retention_days = 7
backup_retain = 3
secret_key = "c2VjcmV0"
allow_private_urls = true
probe_bin = "/usr/bin/ffprobe"
scanner_concurrency = 8
default_max_retries = 5
stall_threshold_secs = 600

[rate_limit]
rps = 2.5
burst = 4

[verification]
timeout_secs = 7200
interval_secs = 10

[[scan_paths]]
id = "movies"
local_root = "/mnt/media/movies"
remote_root = "/movies"
instance_id = "radarr"
enabled = true
auto_remediate = true
max_retries = 2

[[instances]]
id = "radarr"
kind = "movies"
base_url = "http://192.168.1.5:7878"
api_key = "plaintext-key"
enabled = true

[[schedules]]
id = "nightly"
scan_path_id = "movies"
cron = "0 3 * * *"
enabled = true
"#,
    )
    .unwrap();

    let config = DaemonConfig::load(&path).unwrap();
    assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/mendarr")));
    assert_eq!(config.log_level, "debug");
    assert!(config.dry_run);
    assert_eq!(config.rate_limit.rps, 2.5);
    assert_eq!(config.rate_limit.burst, 4);
    assert_eq!(config.verification.timeout_secs, 7200);
    assert_eq!(config.scanner_concurrency, 8);
    assert_eq!(config.scan_paths.len(), 1);
    assert_eq!(config.scan_paths[0].max_retries, 2);
    assert_eq!(config.instances.len(), 1);
    assert_eq!(config.schedules.len(), 1);
}

#[test]
fn bad_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mendarr.toml");
    std::fs::write(&path, "this is not toml = = =").unwrap();
    let err = DaemonConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn store_paths_hang_off_the_data_dir() {
    let config = DaemonConfig {
        data_dir: Some(PathBuf::from("/data")),
        ..DaemonConfig::default()
    };
    let paths = config.store_paths().unwrap();
    assert_eq!(paths.wal_path, PathBuf::from("/data/wal/events.wal"));
    assert_eq!(paths.snapshot_path, PathBuf::from("/data/snapshot.zst"));
    assert_eq!(paths.backups_dir, PathBuf::from("/data/backups"));
    assert_eq!(paths.lock_path, PathBuf::from("/data/mendarrd.pid"));
}

#[test]
fn retention_cutoff_disabled_at_zero() {
    let mut config = DaemonConfig::default();
    config.retention_days = 0;
    assert_eq!(config.retention_cutoff(1_000_000), None);

    config.retention_days = 1;
    let day_ms = 24 * 60 * 60 * 1000;
    assert_eq!(config.retention_cutoff(2 * day_ms), Some(day_ms));
}

#[test]
fn runtime_config_carries_the_knobs() {
    let mut config = DaemonConfig::default();
    config.dry_run = true;
    config.scanner_concurrency = 2;
    config.default_max_retries = 9;
    config.stall_threshold_secs = 60;

    let runtime = config.runtime_config();
    assert!(runtime.global_dry_run);
    assert_eq!(runtime.scanner_concurrency, 2);
    assert_eq!(runtime.default_max_retries, 9);
    assert_eq!(runtime.stall_threshold, Duration::from_secs(60));
}
