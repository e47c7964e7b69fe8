// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{CorruptionKind, DetectionMethod, HealthVerdict};
use tempfile::TempDir;

#[tokio::test]
async fn missing_file_is_inaccessible() {
    let checker = CommandHealthChecker::new("ffprobe");
    let verdict = checker
        .check(Path::new("/definitely/not/here.mkv"), DetectionMethod::Quick)
        .await;
    assert!(matches!(verdict, HealthVerdict::Inaccessible { .. }));
}

#[tokio::test]
async fn zero_length_file_is_corrupt_not_inaccessible() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.mkv");
    std::fs::write(&path, b"").unwrap();

    let checker = CommandHealthChecker::new("ffprobe");
    let verdict = checker.check(&path, DetectionMethod::Quick).await;
    assert_eq!(
        verdict,
        HealthVerdict::Corrupt {
            kind: CorruptionKind::ZeroLength,
            detail: "file contains no bytes".to_string(),
        }
    );
}

#[tokio::test]
async fn unavailable_probe_binary_is_inaccessible() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.mkv");
    std::fs::write(&path, b"not really media").unwrap();

    let checker = CommandHealthChecker::new("/no/such/probe-binary");
    let verdict = checker.check(&path, DetectionMethod::Quick).await;
    match verdict {
        HealthVerdict::Inaccessible { reason } => {
            assert!(reason.contains("probe unavailable"), "{reason}")
        }
        other => panic!("expected inaccessible, got {other:?}"),
    }
}

#[test]
fn quick_and_full_probe_args_differ() {
    let quick = CommandHealthChecker::probe_args(DetectionMethod::Quick, Path::new("/m/a.mkv"));
    let full = CommandHealthChecker::probe_args(DetectionMethod::FullDecode, Path::new("/m/a.mkv"));

    assert!(quick
        .iter()
        .any(|a| a.to_string_lossy() == "stream=codec_type:format=duration"));
    assert!(full.iter().any(|a| a.to_string_lossy() == "-count_packets"));
    // Both end with the target path
    assert_eq!(
        quick.last().map(|a| a.as_os_str()),
        Some(Path::new("/m/a.mkv").as_os_str())
    );
    assert_eq!(
        full.last().map(|a| a.as_os_str()),
        Some(Path::new("/m/a.mkv").as_os_str())
    );
}

#[test]
fn stderr_classification_picks_specific_kinds() {
    assert_eq!(
        CommandHealthChecker::classify_stderr("moov atom not found"),
        CorruptionKind::ContainerStructure
    );
    assert_eq!(
        CommandHealthChecker::classify_stderr("Packet corrupt, premature end of stream"),
        CorruptionKind::Truncated
    );
    assert_eq!(
        CommandHealthChecker::classify_stderr("error decoding video stream"),
        CorruptionKind::VideoStream
    );
    assert_eq!(
        CommandHealthChecker::classify_stderr("audio frame damaged"),
        CorruptionKind::AudioStream
    );
    assert_eq!(
        CommandHealthChecker::classify_stderr("mystery failure"),
        CorruptionKind::Other
    );
}

#[test]
fn first_error_line_skips_blanks() {
    assert_eq!(
        CommandHealthChecker::first_error_line("\n\n  real error here\nmore"),
        "real error here"
    );
    assert_eq!(
        CommandHealthChecker::first_error_line(""),
        "probe reported an error"
    );
}
