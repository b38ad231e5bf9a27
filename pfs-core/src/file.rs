// SPDX-License-Identifier: AGPL-3.0-or-later
//! File handles

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    backend::StorageBackend,
    collision::validate_name,
    entry::{EntryKind, StorageItem},
    error::{PfsError, PfsResult},
    folder::StorageFolder,
    operations::{FileAccess, NameCollisionOption, WriteOptions},
    schedule::Scheduler,
    stream::FileStream,
    VirtualPath,
};

/// A file in some backend.
///
/// The handle holds no cached state besides its name and path: every call
/// asks the backend again. After [`StorageFile::delete`] all operations fail
/// with `NotFound`.
#[derive(Clone)]
pub struct StorageFile {
    name: String,
    path: VirtualPath,
    backend: Arc<dyn StorageBackend>,
    scheduler: Scheduler,
}

impl StorageFile {
    pub(crate) fn new(backend: Arc<dyn StorageBackend>, scheduler: Scheduler, path: VirtualPath) -> Self {
        Self {
            name: path.name().unwrap_or_default().to_string(),
            path,
            backend,
            scheduler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    fn rebind(&mut self, path: VirtualPath) {
        self.name = path.name().unwrap_or_default().to_string();
        self.path = path;
    }

    pub async fn open(&self, access: FileAccess, cancel: &CancellationToken) -> PfsResult<FileStream> {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move { backend.open(&path, access).await })
            .await
    }

    pub async fn delete(&self, cancel: &CancellationToken) -> PfsResult<()> {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move {
                if backend.probe(&path).await?.kind() != Some(EntryKind::File) {
                    return Err(PfsError::NotFound(path.to_string()));
                }
                debug!(%path, "deleting file");
                backend.delete_file(&path).await
            })
            .await
    }

    /// Rename without changing the parent folder.
    pub async fn rename(
        &mut self,
        new_name: &str,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<()> {
        validate_name(new_name)?;
        let target = self.path.with_name(new_name);
        self.move_to(&target, policy, cancel).await
    }

    /// Move to `new_path`, which names the file itself, not its new parent.
    pub async fn move_to(
        &mut self,
        new_path: &VirtualPath,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<()> {
        if !new_path.same_backend(&self.path) {
            return Err(PfsError::Unsupported(format!(
                "cannot move {} to another backend ({})",
                self.path, new_path.backend
            )));
        }
        let (parent, name) = match (new_path.parent(), new_path.name()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Err(PfsError::InvalidArgument(format!("not a file path: {new_path}"))),
        };

        let backend = Arc::clone(&self.backend);
        let source = self.path.clone();
        let token = cancel.clone();
        let moved = self
            .scheduler
            .run(cancel, async move {
                backend.move_file(&source, &parent, &name, policy, &token).await
            })
            .await?;

        debug!(from = %self.path, to = %moved, "moved file");
        self.rebind(moved);
        Ok(())
    }

    /// Move into `folder`, keeping the current name.
    ///
    /// `folder` must come from the same backend instance; a backend that
    /// merely shares this one's id is still another store.
    pub async fn move_into(
        &mut self,
        folder: &StorageFolder,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<()> {
        if !Arc::ptr_eq(&self.backend, folder.backend()) {
            return Err(PfsError::Unsupported(format!(
                "cannot move {} into {}: different backend instance",
                self.path,
                folder.path()
            )));
        }
        let target = folder.path().join(&self.name);
        self.move_to(&target, policy, cancel).await
    }

    /// Write `buffer[offset..offset + count]` at the start of the file.
    ///
    /// Existing bytes past the written range are kept.
    pub async fn write_bytes(
        &self,
        buffer: &[u8],
        offset: usize,
        count: usize,
        cancel: &CancellationToken,
    ) -> PfsResult<()> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| {
                PfsError::InvalidArgument(format!(
                    "range {offset}+{count} exceeds buffer of {} bytes",
                    buffer.len()
                ))
            })?;
        let data = Bytes::copy_from_slice(&buffer[offset..end]);
        self.write(data, WriteOptions::overwrite_in_place(), cancel).await
    }

    pub async fn read_all_bytes(&self, cancel: &CancellationToken) -> PfsResult<Bytes> {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move { backend.read_file(&path).await })
            .await
    }

    pub async fn read_all_text(&self, cancel: &CancellationToken) -> PfsResult<String> {
        let bytes = self.read_all_bytes(cancel).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| PfsError::InvalidData(format!("{}: {e}", self.path)))
    }

    /// Replace the whole content with `contents`.
    pub async fn write_all_text(&self, contents: &str, cancel: &CancellationToken) -> PfsResult<()> {
        let data = Bytes::copy_from_slice(contents.as_bytes());
        self.write(data, WriteOptions::truncate(), cancel).await
    }

    async fn write(&self, data: Bytes, options: WriteOptions, cancel: &CancellationToken) -> PfsResult<()> {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        self.scheduler
            .run(cancel, async move { backend.write_file(&path, data, &options).await })
            .await
    }
}

impl StorageItem for StorageFile {
    fn name(&self) -> &str {
        StorageFile::name(self)
    }

    fn path(&self) -> &VirtualPath {
        StorageFile::path(self)
    }
}

impl fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFile")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
