// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External catalog-manager instance records.

use crate::id::InstanceId;
use serde::{Deserialize, Serialize};

/// Kind of external manager. The wire API differs slightly between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrKind {
    /// Episode-oriented manager (series library)
    Series,
    /// Movie-oriented manager
    Movies,
}

impl std::fmt::Display for ArrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrKind::Series => write!(f, "series"),
            ArrKind::Movies => write!(f, "movies"),
        }
    }
}

/// A configured external manager instance.
///
/// `api_key` is stored encrypted at rest with an `enc:` prefix; a legacy
/// plaintext value is accepted and re-encrypted once a key is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrInstance {
    pub id: InstanceId,
    pub kind: ArrKind,
    pub base_url: String,
    pub api_key: String,
    pub enabled: bool,
}
