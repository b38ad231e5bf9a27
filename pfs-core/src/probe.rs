// SPDX-License-Identifier: AGPL-3.0-or-later
//! Existence probing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{entry::EntryKind, error::PfsResult, VirtualPath};

/// Outcome of an existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExistenceResult {
    NotFound,
    FileExists,
    FolderExists,
}

impl ExistenceResult {
    pub fn exists(self) -> bool {
        self != ExistenceResult::NotFound
    }

    pub fn kind(self) -> Option<EntryKind> {
        match self {
            ExistenceResult::NotFound => None,
            ExistenceResult::FileExists => Some(EntryKind::File),
            ExistenceResult::FolderExists => Some(EntryKind::Directory),
        }
    }
}

impl From<Option<EntryKind>> for ExistenceResult {
    fn from(kind: Option<EntryKind>) -> Self {
        kind.map_or(ExistenceResult::NotFound, EntryKind::existence)
    }
}

/// Read-only existence and type check against a backend.
///
/// Implementations must not have side effects, and a path never classifies
/// as both a file and a folder.
#[async_trait]
pub trait PathProbe: Send + Sync {
    async fn probe(&self, path: &VirtualPath) -> PfsResult<ExistenceResult>;
}
