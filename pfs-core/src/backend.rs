// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage backend trait

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::{
    emulate,
    entry::{Entry, EntryKind},
    error::PfsResult,
    operations::{CreationCollisionOption, FileAccess, NameCollisionOption, WriteOptions},
    probe::PathProbe,
    stream::FileStream,
    VirtualPath,
};

/// Storage backend capabilities
#[derive(Debug, Clone, Default)]
pub struct StorageCapabilities {
    /// Collision-aware operations resolve and act atomically
    pub atomic_collisions: bool,
    /// Files may move between different known-folder roots
    pub cross_root_moves: bool,
    /// A roaming (synced) storage root exists
    pub roaming: bool,
    /// Public Documents/Music/Pictures/Videos libraries may exist
    pub public_libraries: bool,
}

impl StorageCapabilities {
    pub fn desktop() -> Self {
        Self {
            atomic_collisions: false,
            cross_root_moves: true,
            roaming: true,
            public_libraries: true,
        }
    }

    pub fn sandboxed() -> Self {
        Self {
            atomic_collisions: false,
            cross_root_moves: false,
            roaming: false,
            public_libraries: true,
        }
    }

    pub fn virtualized() -> Self {
        Self {
            atomic_collisions: true,
            cross_root_moves: true,
            roaming: true,
            public_libraries: true,
        }
    }
}

/// Well-known storage categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownFolder {
    /// Storage local to the current device
    Local,
    /// Storage synced across the user's devices
    Roaming,
    Personal,
    Documents,
    Music,
    Pictures,
    Videos,
    /// Not a root; marks folders reached through a top-level path lookup
    Path,
}

impl KnownFolder {
    pub const ROOTS: [KnownFolder; 7] = [
        KnownFolder::Local,
        KnownFolder::Roaming,
        KnownFolder::Personal,
        KnownFolder::Documents,
        KnownFolder::Music,
        KnownFolder::Pictures,
        KnownFolder::Videos,
    ];

    pub fn is_public_library(self) -> bool {
        matches!(
            self,
            KnownFolder::Documents | KnownFolder::Music | KnownFolder::Pictures | KnownFolder::Videos
        )
    }
}

impl fmt::Display for KnownFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KnownFolder::Local => "local",
            KnownFolder::Roaming => "roaming",
            KnownFolder::Personal => "personal",
            KnownFolder::Documents => "documents",
            KnownFolder::Music => "music",
            KnownFolder::Pictures => "pictures",
            KnownFolder::Videos => "videos",
            KnownFolder::Path => "path",
        };
        f.write_str(name)
    }
}

/// A storage entry point discovered by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFolder {
    pub path: VirtualPath,
    pub location: KnownFolder,
    /// Always false for discovered roots
    pub can_delete: bool,
}

impl RootFolder {
    pub fn new(path: VirtualPath, location: KnownFolder) -> Self {
        Self { path, location, can_delete: false }
    }
}

/// Storage backend trait
///
/// Primitives report a missing target as `NotFound` and an occupied target
/// as `AlreadyExists`. The collision-aware operations have default
/// implementations that emulate the policies with probe-then-act; those are
/// not atomic. Backends that can resolve under their own lock override them.
#[async_trait]
pub trait StorageBackend: PathProbe {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn capabilities(&self) -> &StorageCapabilities;

    /// Locate a well-known root, or `Unsupported` when this backend has none.
    async fn known_folder(&self, folder: KnownFolder) -> PfsResult<RootFolder>;

    async fn list_directory(&self, path: &VirtualPath) -> PfsResult<Vec<Entry>>;

    /// Create an empty file; fails if anything exists at `path`.
    async fn create_file(&self, path: &VirtualPath) -> PfsResult<()>;
    /// Create a directory; fails if anything exists at `path`.
    async fn create_directory(&self, path: &VirtualPath) -> PfsResult<()>;
    async fn delete_file(&self, path: &VirtualPath) -> PfsResult<()>;
    /// Delete a directory and everything below it.
    async fn delete_directory(&self, path: &VirtualPath) -> PfsResult<()>;
    /// Move a file; `dest` must be free and its parent must exist.
    ///
    /// A `dest` that is the source itself under another spelling (see
    /// [`StorageBackend::same_entry`]) counts as free.
    async fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> PfsResult<()>;

    /// True when `a` and `b` address the same stored entry.
    ///
    /// Case-insensitive stores override this so that `a.txt` and `A.txt`
    /// compare equal.
    async fn same_entry(&self, a: &VirtualPath, b: &VirtualPath) -> PfsResult<bool> {
        Ok(a == b)
    }

    async fn open(&self, path: &VirtualPath, access: FileAccess) -> PfsResult<FileStream>;
    async fn read_file(&self, path: &VirtualPath) -> PfsResult<Bytes>;
    async fn write_file(&self, path: &VirtualPath, data: Bytes, options: &WriteOptions) -> PfsResult<()>;

    /// Create `desired` under `parent` honoring `policy`; returns the path used.
    async fn create_entry(
        &self,
        parent: &VirtualPath,
        desired: &str,
        kind: EntryKind,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        emulate::create_entry(self, parent, desired, kind, policy, cancel).await
    }

    /// Move the file at `source` to `desired` under `dest_parent` honoring `policy`.
    async fn move_file(
        &self,
        source: &VirtualPath,
        dest_parent: &VirtualPath,
        desired: &str,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        emulate::move_file(self, source, dest_parent, desired, policy, cancel).await
    }
}
