// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entry point tying a backend to a scheduler

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{KnownFolder, StorageBackend},
    error::{PfsError, PfsResult},
    file::StorageFile,
    folder::StorageFolder,
    probe::ExistenceResult,
    schedule::Scheduler,
    VirtualPath,
};

/// One backend plus the scheduler its I/O runs on.
///
/// Construct it once at startup and pass it to whatever needs storage.
#[derive(Clone)]
pub struct FileSystem {
    backend: Arc<dyn StorageBackend>,
    scheduler: Scheduler,
}

impl FileSystem {
    pub fn new(backend: Arc<dyn StorageBackend>, scheduler: Scheduler) -> Self {
        Self { backend, scheduler }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Resolve a known root; `Unsupported` when the backend has none.
    pub async fn known_folder(&self, folder: KnownFolder, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        if folder == KnownFolder::Path {
            return Err(PfsError::InvalidArgument(
                "`path` is not a storage root; use get_folder_from_path".into(),
            ));
        }
        let backend = Arc::clone(&self.backend);
        let root = self
            .scheduler
            .run(cancel, async move { backend.known_folder(folder).await })
            .await?;
        Ok(StorageFolder::from_root(Arc::clone(&self.backend), self.scheduler.clone(), root))
    }

    pub async fn local_storage(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Local, cancel).await
    }

    pub async fn roaming_storage(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Roaming, cancel).await
    }

    pub async fn personal_storage(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Personal, cancel).await
    }

    pub async fn documents_folder(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Documents, cancel).await
    }

    pub async fn music_folder(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Music, cancel).await
    }

    pub async fn pictures_folder(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Pictures, cancel).await
    }

    pub async fn videos_folder(&self, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        self.known_folder(KnownFolder::Videos, cancel).await
    }

    fn parse_path(&self, path: &str) -> PfsResult<VirtualPath> {
        if path.is_empty() {
            return Err(PfsError::InvalidArgument("path must not be empty".into()));
        }
        let parsed = VirtualPath::parse_uri(path).unwrap_or_else(|| VirtualPath::new(self.backend.id(), path));
        if parsed.backend != self.backend.id() {
            return Err(PfsError::Unsupported(format!(
                "{path} belongs to backend {}, not {}",
                parsed.backend,
                self.backend.id()
            )));
        }
        Ok(parsed)
    }

    async fn probe(&self, path: &VirtualPath, cancel: &CancellationToken) -> PfsResult<ExistenceResult> {
        let backend = Arc::clone(&self.backend);
        let path = path.clone();
        self.scheduler
            .run(cancel, async move { backend.probe(&path).await })
            .await
    }

    /// Look up a file by its backend path (`/a/b.txt`) or URI (`pfs://id/a/b.txt`).
    pub async fn get_file_from_path(&self, path: &str, cancel: &CancellationToken) -> PfsResult<StorageFile> {
        let vpath = self.parse_path(path)?;
        match self.probe(&vpath, cancel).await? {
            ExistenceResult::FileExists => {
                Ok(StorageFile::new(Arc::clone(&self.backend), self.scheduler.clone(), vpath))
            }
            _ => Err(PfsError::NotFound(format!("file does not exist: {vpath}"))),
        }
    }

    /// Look up a folder by path.
    ///
    /// The result is deletable unless it is the backend root or one of the
    /// backend's known roots.
    pub async fn get_folder_from_path(&self, path: &str, cancel: &CancellationToken) -> PfsResult<StorageFolder> {
        let vpath = self.parse_path(path)?;
        let backend = Arc::clone(&self.backend);
        let target = vpath.clone();
        let (existence, is_root) = self
            .scheduler
            .run(cancel, async move {
                let existence = backend.probe(&target).await?;
                let mut is_root = target.is_root();
                for folder in KnownFolder::ROOTS {
                    if is_root {
                        break;
                    }
                    match backend.known_folder(folder).await {
                        Ok(root) => is_root = root.path == target,
                        Err(PfsError::Unsupported(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok((existence, is_root))
            })
            .await?;

        if existence != ExistenceResult::FolderExists {
            return Err(PfsError::NotFound(format!("folder does not exist: {vpath}")));
        }
        Ok(StorageFolder::new(
            Arc::clone(&self.backend),
            self.scheduler.clone(),
            vpath,
            KnownFolder::Path,
            !is_root,
        ))
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("backend", &self.backend.id())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
