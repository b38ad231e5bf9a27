// SPDX-License-Identifier: AGPL-3.0-or-later
//! Folder handles

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    backend::{KnownFolder, RootFolder, StorageBackend},
    collision::validate_name,
    entry::{EntryKind, StorageItem},
    error::{PfsError, PfsResult},
    file::StorageFile,
    operations::CreationCollisionOption,
    probe::ExistenceResult,
    schedule::Scheduler,
    VirtualPath,
};

/// A folder in some backend.
///
/// Children are never cached; every listing or lookup queries the backend.
/// Roots handed out by [`crate::FileSystem`] cannot be deleted.
#[derive(Clone)]
pub struct StorageFolder {
    name: String,
    path: VirtualPath,
    location: KnownFolder,
    can_delete: bool,
    backend: Arc<dyn StorageBackend>,
    scheduler: Scheduler,
}

async fn ensure_exists(backend: &dyn StorageBackend, path: &VirtualPath) -> PfsResult<()> {
    match backend.probe(path).await? {
        ExistenceResult::FolderExists => Ok(()),
        _ => Err(PfsError::NotFound(format!("folder does not exist: {path}"))),
    }
}

impl StorageFolder {
    pub(crate) fn new(
        backend: Arc<dyn StorageBackend>,
        scheduler: Scheduler,
        path: VirtualPath,
        location: KnownFolder,
        can_delete: bool,
    ) -> Self {
        Self {
            name: path.name().unwrap_or_default().to_string(),
            path,
            location,
            can_delete,
            backend,
            scheduler,
        }
    }

    pub(crate) fn from_root(backend: Arc<dyn StorageBackend>, scheduler: Scheduler, root: RootFolder) -> Self {
        Self::new(backend, scheduler, root.path, root.location, root.can_delete)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn child_folder(&self, path: VirtualPath) -> StorageFolder {
        StorageFolder::new(Arc::clone(&self.backend), self.scheduler.clone(), path, self.location, true)
    }

    fn child_file(&self, path: VirtualPath) -> StorageFile {
        StorageFile::new(Arc::clone(&self.backend), self.scheduler.clone(), path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// The storage category this folder belongs to
    pub fn location(&self) -> KnownFolder {
        self.location
    }

    pub fn can_delete(&self) -> bool {
        self.can_delete
    }

    pub async fn create_file(
        &self,
        desired_name: &str,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<StorageFile> {
        let path = self.create_entry(desired_name, EntryKind::File, policy, cancel).await?;
        Ok(self.child_file(path))
    }

    /// Create a subfolder; `ReplaceExisting` removes the old one with all its contents.
    pub async fn create_folder(
        &self,
        desired_name: &str,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<StorageFolder> {
        let path = self.create_entry(desired_name, EntryKind::Directory, policy, cancel).await?;
        Ok(self.child_folder(path))
    }

    async fn create_entry(
        &self,
        desired_name: &str,
        kind: EntryKind,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        validate_name(desired_name)?;
        debug!(folder = %self.path, name = desired_name, ?policy, "creating {}", kind.describe());

        let backend = Arc::clone(&self.backend);
        let parent = self.path.clone();
        let desired = desired_name.to_string();
        let token = cancel.clone();
        self.scheduler
            .run(cancel, async move {
                ensure_exists(backend.as_ref(), &parent).await?;
                backend.create_entry(&parent, &desired, kind, policy, &token).await
            })
            .await
    }

    pub async fn get_file(&self, name: &str, cancel: &CancellationToken) -> PfsResult<StorageFile> {
        let path = self.get_entry(name, EntryKind::File, cancel).await?;
        Ok(self.child_file(path))
    }

    pub async fn get_folder(&self, name: &str, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        let path = self.get_entry(name, EntryKind::Directory, cancel).await?;
        Ok(self.child_folder(path))
    }

    async fn get_entry(&self, name: &str, kind: EntryKind, cancel: &CancellationToken) -> PfsResult<VirtualPath> {
        validate_name(name)?;
        let path = self.path.join(name);
        let found = self.probe_child(path.clone(), cancel).await?;
        if found.kind() != Some(kind) {
            return Err(PfsError::NotFound(format!("{} does not exist: {path}", kind.describe())));
        }
        Ok(path)
    }

    pub async fn list_files(&self, cancel: &CancellationToken) -> PfsResult<Vec<StorageFile>> {
        let paths = self.list(EntryKind::File, cancel).await?;
        Ok(paths.into_iter().map(|p| self.child_file(p)).collect())
    }

    pub async fn list_folders(&self, cancel: &CancellationToken) -> PfsResult<Vec<StorageFolder>> {
        let paths = self.list(EntryKind::Directory, cancel).await?;
        Ok(paths.into_iter().map(|p| self.child_folder(p)).collect())
    }

    async fn list(&self, kind: EntryKind, cancel: &CancellationToken) -> PfsResult<Vec<VirtualPath>> {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move {
                ensure_exists(backend.as_ref(), &path).await?;
                let entries = backend.list_directory(&path).await?;
                Ok(entries
                    .into_iter()
                    .filter(|e| e.kind == kind)
                    .map(|e| e.path)
                    .collect())
            })
            .await
    }

    pub async fn check_exists(&self, name: &str, cancel: &CancellationToken) -> PfsResult<ExistenceResult> {
        validate_name(name)?;
        self.probe_child(self.path.join(name), cancel).await
    }

    async fn probe_child(&self, path: VirtualPath, cancel: &CancellationToken) -> PfsResult<ExistenceResult> {
        let backend = Arc::clone(&self.backend);
        self.scheduler
            .run(cancel, async move { backend.probe(&path).await })
            .await
    }

    /// Delete this folder and everything in it.
    pub async fn delete(&self, cancel: &CancellationToken) -> PfsResult<()> {
        if !self.can_delete {
            return Err(PfsError::IllegalOperation(format!(
                "cannot delete root storage folder {}",
                self.path
            )));
        }

        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move {
                ensure_exists(backend.as_ref(), &path).await?;
                info!(%path, "deleting folder recursively");
                backend.delete_directory(&path).await
            })
            .await
    }
}

impl StorageItem for StorageFolder {
    fn name(&self) -> &str {
        StorageFolder::name(self)
    }

    fn path(&self) -> &VirtualPath {
        StorageFolder::path(self)
    }
}

impl fmt::Debug for StorageFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFolder")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("location", &self.location)
            .field("can_delete", &self.can_delete)
            .finish_non_exhaustive()
    }
}
