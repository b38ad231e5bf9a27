// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local filesystem backend (desktop-style)

use async_trait::async_trait;
use bytes::Bytes;
use directories::{BaseDirs, ProjectDirs, UserDirs};
use pfs_core::{
    backend::{KnownFolder, RootFolder, StorageBackend, StorageCapabilities},
    entry::Entry,
    error::{PfsError, PfsResult},
    operations::{FileAccess, WriteOptions},
    probe::{ExistenceResult, PathProbe},
    stream::{FileStream, ReadOnly},
    VirtualPath,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Real filesystem under `root`.
///
/// Collision policies are emulated by probing first, so concurrent writers
/// in the same folder can race.
pub struct LocalBackend {
    id: String,
    root: PathBuf,
    capabilities: StorageCapabilities,
    known: HashMap<KnownFolder, PathBuf>,
}

impl LocalBackend {
    pub fn new(id: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            root: root.as_ref().to_path_buf(),
            capabilities: StorageCapabilities::desktop(),
            known: HashMap::new(),
        }
    }

    /// Backend rooted at `root` with known folders taken from the OS.
    ///
    /// Folders the platform does not define stay unregistered and report
    /// `Unsupported`.
    pub fn discover(id: impl Into<String>, root: impl AsRef<Path>, app_name: &str) -> Self {
        let mut backend = Self::new(id, root);
        if let Some(project) = ProjectDirs::from("", "", app_name) {
            backend.known.insert(KnownFolder::Local, project.data_local_dir().to_path_buf());
            backend.known.insert(KnownFolder::Roaming, project.data_dir().to_path_buf());
        }
        if let Some(base) = BaseDirs::new() {
            backend.known.insert(KnownFolder::Personal, base.home_dir().to_path_buf());
        }
        if let Some(user) = UserDirs::new() {
            let libraries = [
                (KnownFolder::Documents, user.document_dir()),
                (KnownFolder::Music, user.audio_dir()),
                (KnownFolder::Pictures, user.picture_dir()),
                (KnownFolder::Videos, user.video_dir()),
            ];
            for (folder, dir) in libraries {
                if let Some(dir) = dir {
                    backend.known.insert(folder, dir.to_path_buf());
                }
            }
        }
        info!(id = %backend.id, root = %backend.root.display(), known = backend.known.len(), "local backend ready");
        backend
    }

    pub fn with_known_folder(mut self, folder: KnownFolder, real: impl AsRef<Path>) -> Self {
        self.known.insert(folder, real.as_ref().to_path_buf());
        self
    }

    pub(crate) fn with_capabilities(mut self, capabilities: StorageCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn to_real_path(&self, path: &VirtualPath) -> PathBuf {
        let mut real = self.root.clone();
        for seg in &path.segments {
            real.push(seg);
        }
        real
    }

    pub(crate) fn to_virtual_path(&self, real: &Path) -> PfsResult<VirtualPath> {
        let relative = real
            .strip_prefix(&self.root)
            .map_err(|_| PfsError::Unsupported(format!("{} is outside {}", real.display(), self.root.display())))?;
        Ok(VirtualPath {
            backend: self.id.clone(),
            segments: relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect(),
        })
    }

    async fn existence(&self, real: &Path) -> PfsResult<ExistenceResult> {
        match fs::metadata(real).await {
            Ok(meta) if meta.is_dir() => Ok(ExistenceResult::FolderExists),
            Ok(_) => Ok(ExistenceResult::FileExists),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ExistenceResult::NotFound),
            Err(e) => Err(PfsError::Io(e)),
        }
    }

    async fn require_file(&self, path: &VirtualPath) -> PfsResult<PathBuf> {
        let real = self.to_real_path(path);
        match self.existence(&real).await? {
            ExistenceResult::FileExists => Ok(real),
            _ => Err(PfsError::NotFound(path.to_string())),
        }
    }
}

/// Copy then delete, for renames the OS refuses across devices.
///
/// A failed copy removes the partial `dst` so the name is free again.
async fn move_across_devices(src: &Path, dst: &Path) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    let out = options.open(dst).await?;
    if let Err(e) = copy_into(src, out).await {
        if let Err(cleanup) = fs::remove_file(dst).await {
            warn!(dst = %dst.display(), error = %cleanup, "could not remove partial copy");
        }
        return Err(e);
    }
    fs::remove_file(src).await
}

async fn copy_into(src: &Path, mut out: fs::File) -> io::Result<()> {
    let mut input = fs::File::open(src).await?;
    tokio::io::copy(&mut input, &mut out).await?;
    out.flush().await
}

/// Both names resolve to one file on disk.
#[cfg(unix)]
async fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a).await?, fs::metadata(b).await?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
async fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(fs::canonicalize(a).await? == fs::canonicalize(b).await?)
}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

#[async_trait]
impl PathProbe for LocalBackend {
    async fn probe(&self, path: &VirtualPath) -> PfsResult<ExistenceResult> {
        self.existence(&self.to_real_path(path)).await
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Local Filesystem"
    }

    fn capabilities(&self) -> &StorageCapabilities {
        &self.capabilities
    }

    async fn known_folder(&self, folder: KnownFolder) -> PfsResult<RootFolder> {
        let real = self
            .known
            .get(&folder)
            .ok_or_else(|| PfsError::Unsupported(format!("{folder} storage is not available on {}", self.id)))?;
        let path = self.to_virtual_path(real)?;
        if matches!(folder, KnownFolder::Local | KnownFolder::Roaming) {
            fs::create_dir_all(real).await?;
        }
        Ok(RootFolder::new(path, folder))
    }

    async fn list_directory(&self, path: &VirtualPath) -> PfsResult<Vec<Entry>> {
        let real = self.to_real_path(path);
        let mut read_dir = fs::read_dir(&real).await.map_err(|e| PfsError::from_io(e, path))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let child = path.join(entry.file_name().to_string_lossy());
            if entry.file_type().await?.is_dir() {
                entries.push(Entry::directory(child));
            } else {
                entries.push(Entry::file(child));
            }
        }
        Ok(entries)
    }

    async fn create_file(&self, path: &VirtualPath) -> PfsResult<()> {
        let real = self.to_real_path(path);
        debug!(%path, "create file");
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&real)
            .await
            .map_err(|e| PfsError::from_io(e, path))?;
        Ok(())
    }

    async fn create_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        debug!(%path, "create directory");
        fs::create_dir(self.to_real_path(path))
            .await
            .map_err(|e| PfsError::from_io(e, path))
    }

    async fn delete_file(&self, path: &VirtualPath) -> PfsResult<()> {
        debug!(%path, "delete file");
        fs::remove_file(self.to_real_path(path))
            .await
            .map_err(|e| PfsError::from_io(e, path))
    }

    async fn delete_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        debug!(%path, "delete directory tree");
        fs::remove_dir_all(self.to_real_path(path))
            .await
            .map_err(|e| PfsError::from_io(e, path))
    }

    async fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> PfsResult<()> {
        let src_real = self.require_file(source).await?;
        let dst_real = self.to_real_path(dest);

        // std::fs::rename silently replaces on unix
        if self.existence(&dst_real).await?.exists() && !self.same_entry(source, dest).await? {
            return Err(PfsError::AlreadyExists(dest.to_string()));
        }

        debug!(%source, %dest, "rename");
        match fs::rename(&src_real, &dst_real).await {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => move_across_devices(&src_real, &dst_real)
                .await
                .map_err(|e| PfsError::from_io(e, dest)),
            Err(e) => Err(PfsError::from_io(e, dest)),
        }
    }

    /// Names that differ only in case and resolve to one file are the same
    /// entry on a case-insensitive volume. Other hard links stay distinct.
    async fn same_entry(&self, a: &VirtualPath, b: &VirtualPath) -> PfsResult<bool> {
        if a == b {
            return Ok(true);
        }
        let (Some(a_name), Some(b_name)) = (a.name(), b.name()) else {
            return Ok(false);
        };
        if a.parent() != b.parent() || a_name.to_lowercase() != b_name.to_lowercase() {
            return Ok(false);
        }
        match same_file(&self.to_real_path(a), &self.to_real_path(b)).await {
            Ok(same) => Ok(same),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PfsError::Io(e)),
        }
    }

    async fn open(&self, path: &VirtualPath, access: FileAccess) -> PfsResult<FileStream> {
        let real = self.require_file(path).await?;
        let stream: FileStream = match access {
            FileAccess::Read => {
                let file = fs::File::open(&real).await.map_err(|e| PfsError::from_io(e, path))?;
                Box::new(ReadOnly::new(file))
            }
            FileAccess::ReadWrite => {
                let file = fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&real)
                    .await
                    .map_err(|e| PfsError::from_io(e, path))?;
                Box::new(file)
            }
        };
        Ok(stream)
    }

    async fn read_file(&self, path: &VirtualPath) -> PfsResult<Bytes> {
        let real = self.require_file(path).await?;
        let data = fs::read(&real).await.map_err(|e| PfsError::from_io(e, path))?;
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &VirtualPath, data: Bytes, options: &WriteOptions) -> PfsResult<()> {
        let real = self.require_file(path).await?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(options.truncate)
            .open(&real)
            .await
            .map_err(|e| PfsError::from_io(e, path))?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }
}
