// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path translation between external-manager and local namespaces.
//!
//! Resolution picks the longest-prefix match among the mappings configured
//! for an instance, then substitutes prefixes. Unmapped paths are returned
//! verbatim with a flag so callers can decide whether to proceed.

use crate::id::InstanceId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One prefix pair for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub instance_id: InstanceId,
    pub local_prefix: PathBuf,
    pub remote_prefix: PathBuf,
}

/// Result of a translation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped {
    Mapped(PathBuf),
    /// No mapping matched; the input is returned verbatim.
    Unmapped(PathBuf),
}

impl Mapped {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Mapped::Mapped(_))
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Mapped::Mapped(p) | Mapped::Unmapped(p) => p,
        }
    }

    pub fn as_path(&self) -> &Path {
        match self {
            Mapped::Mapped(p) | Mapped::Unmapped(p) => p,
        }
    }
}

/// Longest-prefix path translator.
#[derive(Debug, Clone, Default)]
pub struct PathMapper {
    mappings: Vec<PathMapping>,
}

impl PathMapper {
    pub fn new(mappings: Vec<PathMapping>) -> Self {
        Self { mappings }
    }

    /// Translate an external-manager path into the local namespace.
    pub fn to_local(&self, remote: &Path, instance: &InstanceId) -> Mapped {
        self.translate(remote, instance, |m| (&m.remote_prefix, &m.local_prefix))
    }

    /// Translate a local path into the external-manager namespace.
    pub fn to_remote(&self, local: &Path, instance: &InstanceId) -> Mapped {
        self.translate(local, instance, |m| (&m.local_prefix, &m.remote_prefix))
    }

    fn translate<'a>(
        &'a self,
        path: &Path,
        instance: &InstanceId,
        select: impl Fn(&'a PathMapping) -> (&'a PathBuf, &'a PathBuf),
    ) -> Mapped {
        let mut best: Option<(&PathBuf, &PathBuf)> = None;

        for mapping in self.mappings.iter().filter(|m| &m.instance_id == instance) {
            let (from, to) = select(mapping);
            if path.starts_with(from) {
                let longer = match best {
                    Some((current, _)) => from.as_os_str().len() > current.as_os_str().len(),
                    None => true,
                };
                if longer {
                    best = Some((from, to));
                }
            }
        }

        match best {
            Some((from, to)) => match path.strip_prefix(from) {
                Ok(rest) => Mapped::Mapped(to.join(rest)),
                Err(_) => Mapped::Unmapped(path.to_path_buf()),
            },
            None => Mapped::Unmapped(path.to_path_buf()),
        }
    }
}

#[cfg(test)]
#[path = "pathmap_tests.rs"]
mod tests;
