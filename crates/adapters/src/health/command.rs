// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health checker backed by an external probe binary (ffprobe-compatible).

use super::HealthChecker;
use async_trait::async_trait;
use mendarr_core::{CorruptionKind, DetectionMethod, HealthVerdict};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default wall-clock bound on one probe invocation. A probe hung on a dead
/// mount must surface as inaccessibility, not block a scan worker forever.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Invokes a media probe and maps its outcome onto the tri-state verdict.
#[derive(Clone)]
pub struct CommandHealthChecker {
    probe_bin: PathBuf,
    timeout: Duration,
}

impl CommandHealthChecker {
    pub fn new(probe_bin: impl Into<PathBuf>) -> Self {
        Self {
            probe_bin: probe_bin.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn probe_args(method: DetectionMethod, path: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
        ];
        match method {
            DetectionMethod::Quick => {
                args.push("stream=codec_type:format=duration".into());
            }
            DetectionMethod::FullDecode => {
                // Reading every packet catches mid-file damage the header
                // probe misses
                args.push("stream=nb_read_packets".into());
                args.push("-count_packets".into());
            }
        }
        args.push("-of".into());
        args.push("json".into());
        args.push(path.as_os_str().to_owned());
        args
    }

    /// Classify probe stderr into a corruption kind.
    fn classify_stderr(stderr: &str) -> CorruptionKind {
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("moov atom") || lower.contains("invalid data found") {
            CorruptionKind::ContainerStructure
        } else if lower.contains("truncat") || lower.contains("premature end") {
            CorruptionKind::Truncated
        } else if lower.contains("video") {
            CorruptionKind::VideoStream
        } else if lower.contains("audio") {
            CorruptionKind::AudioStream
        } else {
            CorruptionKind::Other
        }
    }

    fn first_error_line(stderr: &str) -> String {
        stderr
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("probe reported an error")
            .trim()
            .to_string()
    }
}

#[async_trait]
impl HealthChecker for CommandHealthChecker {
    async fn check(&self, path: &Path, method: DetectionMethod) -> HealthVerdict {
        // Metadata first: distinguish missing/unreadable from damaged
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return HealthVerdict::Inaccessible {
                    reason: "file not found".to_string(),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return HealthVerdict::Inaccessible {
                    reason: "permission denied".to_string(),
                }
            }
            Err(e) => {
                return HealthVerdict::Inaccessible {
                    reason: e.to_string(),
                }
            }
        };

        if metadata.len() == 0 {
            return HealthVerdict::Corrupt {
                kind: CorruptionKind::ZeroLength,
                detail: "file contains no bytes".to_string(),
            };
        }

        let output = Command::new(&self.probe_bin)
            .args(Self::probe_args(method, path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Err(_) => {
                warn!(path = %path.display(), "probe timed out");
                return HealthVerdict::Inaccessible {
                    reason: "probe timed out".to_string(),
                };
            }
            Ok(Err(e)) => {
                // The probe binary itself is unusable; treat as
                // inaccessibility so nothing destructive happens
                warn!(probe = %self.probe_bin.display(), error = %e, "failed to run probe");
                return HealthVerdict::Inaccessible {
                    reason: format!("probe unavailable: {e}"),
                };
            }
            Ok(Ok(output)) => output,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() && stderr.trim().is_empty() {
            debug!(path = %path.display(), "probe clean");
            return HealthVerdict::Healthy;
        }

        HealthVerdict::Corrupt {
            kind: Self::classify_stderr(&stderr),
            detail: Self::first_error_line(&stderr),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
