// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sandboxed app container (mobile-style)
//!
//! The namespace has two volumes: `/internal` lives in the app container and
//! `/external` on shared storage that may be unmounted at any time. Public
//! libraries are only reachable while the external volume is mounted.

use async_trait::async_trait;
use bytes::Bytes;
use pfs_core::{
    backend::{KnownFolder, RootFolder, StorageBackend, StorageCapabilities},
    emulate,
    entry::Entry,
    error::{PfsError, PfsResult},
    operations::{FileAccess, NameCollisionOption, WriteOptions},
    probe::{ExistenceResult, PathProbe},
    stream::FileStream,
    CancellationToken, VirtualPath,
};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{info, warn};

use crate::local::LocalBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volume {
    Internal,
    External,
}

impl Volume {
    pub fn segment(self) -> &'static str {
        match self {
            Volume::Internal => "internal",
            Volume::External => "external",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "internal" => Some(Volume::Internal),
            "external" => Some(Volume::External),
            _ => None,
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Where each known folder lives inside the container
fn known_location(folder: KnownFolder) -> Option<(Volume, &'static str)> {
    match folder {
        KnownFolder::Local | KnownFolder::Personal => Some((Volume::Internal, "files")),
        KnownFolder::Documents => Some((Volume::External, "Documents")),
        KnownFolder::Music => Some((Volume::External, "Music")),
        KnownFolder::Pictures => Some((Volume::External, "Pictures")),
        KnownFolder::Videos => Some((Volume::External, "Movies")),
        KnownFolder::Roaming | KnownFolder::Path => None,
    }
}

pub struct SandboxBackend {
    id: String,
    capabilities: StorageCapabilities,
    internal: LocalBackend,
    external: LocalBackend,
    external_mounted: AtomicBool,
}

impl SandboxBackend {
    pub fn new(id: impl Into<String>, container: impl AsRef<Path>, external: impl AsRef<Path>) -> Self {
        let id = id.into();
        let capabilities = StorageCapabilities::sandboxed();
        let internal = LocalBackend::new(format!("{id}-internal"), container).with_capabilities(capabilities.clone());
        let external = LocalBackend::new(format!("{id}-external"), external).with_capabilities(capabilities.clone());
        info!(
            %id,
            container = %internal.root().display(),
            external = %external.root().display(),
            "sandbox backend ready"
        );
        Self {
            id,
            capabilities,
            internal,
            external,
            external_mounted: AtomicBool::new(true),
        }
    }

    pub fn with_external_mounted(self, mounted: bool) -> Self {
        self.set_external_mounted(mounted);
        self
    }

    pub fn set_external_mounted(&self, mounted: bool) {
        self.external_mounted.store(mounted, Ordering::SeqCst);
    }

    pub fn is_external_mounted(&self) -> bool {
        self.external_mounted.load(Ordering::SeqCst)
    }

    fn volume_of(&self, path: &VirtualPath) -> PfsResult<Volume> {
        let first = path
            .segments
            .first()
            .ok_or_else(|| PfsError::Unsupported(format!("the sandbox root is not writable: {path}")))?;
        Volume::from_segment(first).ok_or_else(|| PfsError::NotFound(path.to_string()))
    }

    fn disk(&self, volume: Volume) -> PfsResult<&LocalBackend> {
        match volume {
            Volume::Internal => Ok(&self.internal),
            Volume::External if self.is_external_mounted() => Ok(&self.external),
            Volume::External => Err(PfsError::Unsupported("external storage is not mounted".into())),
        }
    }

    /// Map a sandbox path onto the disk backend that holds it.
    fn route(&self, path: &VirtualPath) -> PfsResult<(&LocalBackend, VirtualPath)> {
        let disk = self.disk(self.volume_of(path)?)?;
        let inner = VirtualPath {
            backend: disk.id().to_string(),
            segments: path.segments[1..].to_vec(),
        };
        Ok((disk, inner))
    }

    fn outer(&self, volume: Volume, inner: &VirtualPath) -> VirtualPath {
        let mut segments = Vec::with_capacity(inner.segments.len() + 1);
        segments.push(volume.segment().to_string());
        segments.extend(inner.segments.iter().cloned());
        VirtualPath {
            backend: self.id.clone(),
            segments,
        }
    }

    fn ensure_same_volume(&self, source: &VirtualPath, dest: &VirtualPath) -> PfsResult<()> {
        let (from, to) = (self.volume_of(source)?, self.volume_of(dest)?);
        if from != to {
            return Err(PfsError::Unsupported(format!(
                "cannot move between {from} and {to} storage"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PathProbe for SandboxBackend {
    async fn probe(&self, path: &VirtualPath) -> PfsResult<ExistenceResult> {
        if path.is_root() {
            return Ok(ExistenceResult::FolderExists);
        }
        match self.route(path) {
            Ok((disk, inner)) => disk.probe(&inner).await,
            Err(PfsError::NotFound(_)) => Ok(ExistenceResult::NotFound),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl StorageBackend for SandboxBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Sandboxed Container"
    }

    fn capabilities(&self) -> &StorageCapabilities {
        &self.capabilities
    }

    async fn known_folder(&self, folder: KnownFolder) -> PfsResult<RootFolder> {
        let (volume, dir) = known_location(folder)
            .ok_or_else(|| PfsError::Unsupported(format!("{folder} storage is not available in a sandbox")))?;
        let disk = match self.disk(volume) {
            Ok(disk) => disk,
            Err(e) => {
                warn!(%folder, "external storage unmounted; library unavailable");
                return Err(e);
            }
        };
        fs::create_dir_all(disk.root().join(dir)).await?;
        let path = VirtualPath::root(&self.id).join(volume.segment()).join(dir);
        Ok(RootFolder::new(path, folder))
    }

    async fn list_directory(&self, path: &VirtualPath) -> PfsResult<Vec<Entry>> {
        if path.is_root() {
            let mut volumes = vec![Entry::directory(path.join(Volume::Internal.segment()))];
            if self.is_external_mounted() {
                volumes.push(Entry::directory(path.join(Volume::External.segment())));
            }
            return Ok(volumes);
        }
        let volume = self.volume_of(path)?;
        let (disk, inner) = self.route(path)?;
        let entries = disk.list_directory(&inner).await?;
        Ok(entries
            .into_iter()
            .map(|e| Entry {
                path: self.outer(volume, &e.path),
                kind: e.kind,
            })
            .collect())
    }

    async fn create_file(&self, path: &VirtualPath) -> PfsResult<()> {
        let (disk, inner) = self.route(path)?;
        disk.create_file(&inner).await
    }

    async fn create_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        let (disk, inner) = self.route(path)?;
        disk.create_directory(&inner).await
    }

    async fn delete_file(&self, path: &VirtualPath) -> PfsResult<()> {
        let (disk, inner) = self.route(path)?;
        disk.delete_file(&inner).await
    }

    async fn delete_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        if path.segments.len() < 2 {
            return Err(PfsError::IllegalOperation(format!("cannot delete volume {path}")));
        }
        let (disk, inner) = self.route(path)?;
        disk.delete_directory(&inner).await
    }

    async fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> PfsResult<()> {
        self.ensure_same_volume(source, dest)?;
        let (disk, from) = self.route(source)?;
        let (_, to) = self.route(dest)?;
        disk.rename(&from, &to).await
    }

    async fn same_entry(&self, a: &VirtualPath, b: &VirtualPath) -> PfsResult<bool> {
        if self.volume_of(a)? != self.volume_of(b)? {
            return Ok(false);
        }
        let (disk, a) = self.route(a)?;
        let (_, b) = self.route(b)?;
        disk.same_entry(&a, &b).await
    }

    async fn open(&self, path: &VirtualPath, access: FileAccess) -> PfsResult<FileStream> {
        let (disk, inner) = self.route(path)?;
        disk.open(&inner, access).await
    }

    async fn read_file(&self, path: &VirtualPath) -> PfsResult<Bytes> {
        let (disk, inner) = self.route(path)?;
        disk.read_file(&inner).await
    }

    async fn write_file(&self, path: &VirtualPath, data: Bytes, options: &WriteOptions) -> PfsResult<()> {
        let (disk, inner) = self.route(path)?;
        disk.write_file(&inner, data, options).await
    }

    async fn move_file(
        &self,
        source: &VirtualPath,
        dest_parent: &VirtualPath,
        desired: &str,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        // Checked before resolution so ReplaceExisting never deletes a target
        // the rename would then refuse.
        self.ensure_same_volume(source, dest_parent)?;
        emulate::move_file(self, source, dest_parent, desired, policy, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _container: TempDir,
        _external: TempDir,
        backend: SandboxBackend,
    }

    fn fixture() -> Fixture {
        let container = TempDir::new().unwrap();
        let external = TempDir::new().unwrap();
        let backend = SandboxBackend::new("sandbox", container.path(), external.path());
        Fixture {
            _container: container,
            _external: external,
            backend,
        }
    }

    #[tokio::test]
    async fn test_roaming_is_unsupported() {
        let fx = fixture();
        let err = fx.backend.known_folder(KnownFolder::Roaming).await.unwrap_err();
        assert!(matches!(err, PfsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_local_and_personal_share_internal_files() {
        let fx = fixture();
        let local = fx.backend.known_folder(KnownFolder::Local).await.unwrap();
        let personal = fx.backend.known_folder(KnownFolder::Personal).await.unwrap();
        assert_eq!(local.path, personal.path);
        assert_eq!(local.path.to_path_string(), "/internal/files");
        assert_eq!(fx.backend.probe(&local.path).await.unwrap(), ExistenceResult::FolderExists);
    }

    #[tokio::test]
    async fn test_libraries_follow_mount_state() {
        let fx = fixture();
        let music = fx.backend.known_folder(KnownFolder::Music).await.unwrap();
        assert_eq!(music.path.to_path_string(), "/external/Music");

        fx.backend.set_external_mounted(false);
        let err = fx.backend.known_folder(KnownFolder::Music).await.unwrap_err();
        assert!(matches!(err, PfsError::Unsupported(_)));
        assert!(fx.backend.probe(&music.path).await.is_err());

        let root = fx.backend.list_directory(&VirtualPath::root("sandbox")).await.unwrap();
        assert_eq!(root.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_across_volumes_is_unsupported() {
        let fx = fixture();
        let docs = fx.backend.known_folder(KnownFolder::Documents).await.unwrap();
        let local = fx.backend.known_folder(KnownFolder::Local).await.unwrap();
        let source = local.path.join("a.txt");
        fx.backend.create_file(&source).await.unwrap();

        let err = fx.backend.rename(&source, &docs.path.join("a.txt")).await.unwrap_err();
        assert!(matches!(err, PfsError::Unsupported(_)));
        assert!(fx.backend.probe(&source).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_listing_maps_paths_back() {
        let fx = fixture();
        let local = fx.backend.known_folder(KnownFolder::Local).await.unwrap();
        fx.backend.create_file(&local.path.join("a.txt")).await.unwrap();

        let entries = fx.backend.list_directory(&local.path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.to_uri(), "pfs://sandbox/internal/files/a.txt");
    }

    #[tokio::test]
    async fn test_volumes_cannot_be_deleted() {
        let fx = fixture();
        let err = fx
            .backend
            .delete_directory(&VirtualPath::new("sandbox", "/internal"))
            .await
            .unwrap_err();
        assert!(matches!(err, PfsError::IllegalOperation(_)));
    }
}
