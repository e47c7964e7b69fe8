// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-check vocabulary: the tri-state verdict over a media file.

use serde::{Deserialize, Serialize};

/// Category of data defect reported by a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionKind {
    /// Video stream fails to decode or is missing
    VideoStream,
    /// Audio stream fails to decode or is missing
    AudioStream,
    /// Container metadata is damaged (e.g. missing index)
    ContainerStructure,
    /// File ends before its declared length
    Truncated,
    /// File exists but contains no bytes
    ZeroLength,
    /// Defect that fits no specific category
    Other,
}

impl std::fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CorruptionKind::VideoStream => "video_stream",
            CorruptionKind::AudioStream => "audio_stream",
            CorruptionKind::ContainerStructure => "container_structure",
            CorruptionKind::Truncated => "truncated",
            CorruptionKind::ZeroLength => "zero_length",
            CorruptionKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a health check over a local file path.
///
/// `Inaccessible` is deliberately distinct from `Corrupt`: a file behind a
/// lost mount must never be remediated (remediation deletes the file in the
/// external manager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    Corrupt { kind: CorruptionKind, detail: String },
    Inaccessible { reason: String },
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy)
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, HealthVerdict::Corrupt { .. })
    }

    pub fn is_inaccessible(&self) -> bool {
        matches!(self, HealthVerdict::Inaccessible { .. })
    }
}
