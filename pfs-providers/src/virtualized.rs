// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory backend with native collision handling
//!
//! Models a virtualized, cloud-synced store: every known folder exists,
//! including roaming storage, and collision-aware operations resolve and act
//! under one lock so concurrent callers never race for a name.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pfs_core::{
    backend::{KnownFolder, RootFolder, StorageBackend, StorageCapabilities},
    collision::{self, Resolution},
    entry::{Entry, EntryKind},
    error::{PfsError, PfsResult},
    operations::{CreationCollisionOption, FileAccess, NameCollisionOption, WriteOptions},
    probe::{ExistenceResult, PathProbe},
    stream::{FileStream, ReadOnly},
    CancellationToken, VirtualPath,
};
use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};
use tracing::{debug, info};

type Content = Arc<Mutex<Vec<u8>>>;
type Key = Vec<String>;

enum Node {
    File(Content),
    Directory,
}

impl Node {
    fn empty(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Node::File(Arc::default()),
            EntryKind::Directory => Node::Directory,
        }
    }

    fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Directory => EntryKind::Directory,
        }
    }
}

/// Keys sort so that a folder is followed directly by everything below it.
type Tree = BTreeMap<Key, Node>;

fn existence(tree: &Tree, key: &[String]) -> ExistenceResult {
    tree.get(key).map(Node::kind).into()
}

fn require_directory(tree: &Tree, path: &VirtualPath) -> PfsResult<()> {
    match tree.get(&path.segments) {
        Some(Node::Directory) => Ok(()),
        _ => Err(PfsError::NotFound(format!("folder does not exist: {path}"))),
    }
}

fn require_free(tree: &Tree, path: &VirtualPath) -> PfsResult<()> {
    if tree.contains_key(&path.segments) {
        return Err(PfsError::AlreadyExists(path.to_string()));
    }
    Ok(())
}

fn file_content(tree: &Tree, path: &VirtualPath) -> PfsResult<Content> {
    match tree.get(&path.segments) {
        Some(Node::File(content)) => Ok(Arc::clone(content)),
        _ => Err(PfsError::NotFound(format!("file does not exist: {path}"))),
    }
}

fn remove_subtree(tree: &mut Tree, key: &[String]) {
    let doomed: Vec<Key> = tree
        .range(key.to_vec()..)
        .take_while(|(k, _)| k.starts_with(key))
        .map(|(k, _)| k.clone())
        .collect();
    for k in doomed {
        tree.remove(&k);
    }
}

fn known_location(folder: KnownFolder) -> Option<&'static str> {
    match folder {
        KnownFolder::Local => Some("LocalState"),
        KnownFolder::Roaming => Some("RoamingState"),
        KnownFolder::Personal => Some("Personal"),
        KnownFolder::Documents => Some("Libraries/Documents"),
        KnownFolder::Music => Some("Libraries/Music"),
        KnownFolder::Pictures => Some("Libraries/Pictures"),
        KnownFolder::Videos => Some("Libraries/Videos"),
        KnownFolder::Path => None,
    }
}

pub struct VirtualBackend {
    id: String,
    capabilities: StorageCapabilities,
    tree: Mutex<Tree>,
}

impl VirtualBackend {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut tree = Tree::new();
        tree.insert(Vec::new(), Node::Directory);
        for folder in KnownFolder::ROOTS {
            if let Some(location) = known_location(folder) {
                let mut key = Vec::new();
                for segment in location.split('/') {
                    key.push(segment.to_string());
                    tree.entry(key.clone()).or_insert(Node::Directory);
                }
            }
        }
        info!(%id, "virtual backend ready");
        Self {
            id,
            capabilities: StorageCapabilities::virtualized(),
            tree: Mutex::new(tree),
        }
    }

    /// Number of entries below the backend root
    pub fn len(&self) -> usize {
        self.tree.lock().len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PathProbe for VirtualBackend {
    async fn probe(&self, path: &VirtualPath) -> PfsResult<ExistenceResult> {
        Ok(existence(&self.tree.lock(), &path.segments))
    }
}

#[async_trait]
impl StorageBackend for VirtualBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Virtual Storage"
    }

    fn capabilities(&self) -> &StorageCapabilities {
        &self.capabilities
    }

    async fn known_folder(&self, folder: KnownFolder) -> PfsResult<RootFolder> {
        let location = known_location(folder)
            .ok_or_else(|| PfsError::Unsupported(format!("{folder} is not a storage root")))?;
        let path = VirtualPath::new(&self.id, location);
        let mut tree = self.tree.lock();
        tree.entry(path.segments.clone()).or_insert(Node::Directory);
        Ok(RootFolder::new(path, folder))
    }

    async fn list_directory(&self, path: &VirtualPath) -> PfsResult<Vec<Entry>> {
        let tree = self.tree.lock();
        require_directory(&tree, path)?;
        let depth = path.segments.len() + 1;
        Ok(tree
            .range(path.segments.clone()..)
            .skip(1)
            .take_while(|(k, _)| k.starts_with(&path.segments))
            .filter(|(k, _)| k.len() == depth)
            .map(|(k, node)| Entry {
                path: VirtualPath {
                    backend: self.id.clone(),
                    segments: k.clone(),
                },
                kind: node.kind(),
            })
            .collect())
    }

    async fn create_file(&self, path: &VirtualPath) -> PfsResult<()> {
        self.insert(path, EntryKind::File)
    }

    async fn create_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        self.insert(path, EntryKind::Directory)
    }

    async fn delete_file(&self, path: &VirtualPath) -> PfsResult<()> {
        let mut tree = self.tree.lock();
        file_content(&tree, path)?;
        tree.remove(&path.segments);
        Ok(())
    }

    async fn delete_directory(&self, path: &VirtualPath) -> PfsResult<()> {
        if path.is_root() {
            return Err(PfsError::IllegalOperation("cannot delete the backend root".into()));
        }
        let mut tree = self.tree.lock();
        require_directory(&tree, path)?;
        remove_subtree(&mut tree, &path.segments);
        Ok(())
    }

    async fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> PfsResult<()> {
        let mut tree = self.tree.lock();
        file_content(&tree, source)?;
        require_free(&tree, dest)?;
        if let Some(parent) = dest.parent() {
            require_directory(&tree, &parent)?;
        }
        if let Some(node) = tree.remove(&source.segments) {
            tree.insert(dest.segments.clone(), node);
        }
        Ok(())
    }

    async fn open(&self, path: &VirtualPath, access: FileAccess) -> PfsResult<FileStream> {
        let content = file_content(&self.tree.lock(), path)?;
        let stream = MemoryStream::new(content);
        Ok(match access {
            FileAccess::Read => Box::new(ReadOnly::new(stream)),
            FileAccess::ReadWrite => Box::new(stream),
        })
    }

    async fn read_file(&self, path: &VirtualPath) -> PfsResult<Bytes> {
        let content = file_content(&self.tree.lock(), path)?;
        let data = content.lock();
        Ok(Bytes::copy_from_slice(&data))
    }

    async fn write_file(&self, path: &VirtualPath, data: Bytes, options: &WriteOptions) -> PfsResult<()> {
        let content = file_content(&self.tree.lock(), path)?;
        let mut buf = content.lock();
        if options.truncate {
            buf.clear();
        }
        if buf.len() < data.len() {
            buf.resize(data.len(), 0);
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(())
    }

    async fn create_entry(
        &self,
        parent: &VirtualPath,
        desired: &str,
        kind: EntryKind,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        let mut tree = self.tree.lock();
        require_directory(&tree, parent)?;
        let resolution = collision::resolve_with(parent, desired, kind, policy, cancel, |p| {
            existence(&tree, &p.segments)
        })?;

        let path = match resolution {
            Resolution::UseExisting(path) => return Ok(path),
            Resolution::Replace(path) => {
                debug!(%path, "replacing existing {}", kind.describe());
                remove_subtree(&mut tree, &path.segments);
                path
            }
            Resolution::Create(path) => path,
        };
        tree.insert(path.segments.clone(), Node::empty(kind));
        Ok(path)
    }

    async fn move_file(
        &self,
        source: &VirtualPath,
        dest_parent: &VirtualPath,
        desired: &str,
        policy: NameCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<VirtualPath> {
        collision::validate_name(desired)?;
        let mut tree = self.tree.lock();
        file_content(&tree, source)?;
        if dest_parent.join(desired) == *source {
            return Ok(source.clone());
        }
        require_directory(&tree, dest_parent)?;

        let resolution = collision::resolve_with(dest_parent, desired, EntryKind::File, policy.into(), cancel, |p| {
            existence(&tree, &p.segments)
        })?;
        if let Resolution::Replace(path) = &resolution {
            tree.remove(&path.segments);
        }
        let dest = resolution.into_path();
        let node = tree
            .remove(&source.segments)
            .ok_or_else(|| PfsError::NotFound(source.to_string()))?;
        tree.insert(dest.segments.clone(), node);
        debug!(from = %source, to = %dest, "moved file");
        Ok(dest)
    }
}

impl VirtualBackend {
    fn insert(&self, path: &VirtualPath, kind: EntryKind) -> PfsResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| PfsError::AlreadyExists(path.to_string()))?;
        let mut tree = self.tree.lock();
        require_directory(&tree, &parent)?;
        require_free(&tree, path)?;
        tree.insert(path.segments.clone(), Node::empty(kind));
        Ok(())
    }
}

/// Largest size an in-memory file may grow to through a stream
pub const MAX_STREAM_LEN: usize = 1 << 32;

/// Seekable stream over an in-memory file.
///
/// Shares the buffer with the tree, so writes are visible to other handles
/// immediately and survive renames.
pub struct MemoryStream {
    content: Content,
    position: u64,
}

impl MemoryStream {
    fn new(content: Content) -> Self {
        Self { content, position: 0 }
    }

    fn offset(&self) -> io::Result<usize> {
        usize::try_from(self.position).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position overflow"))
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let start = this.offset()?;
        let data = this.content.lock();
        if start < data.len() {
            let len = std::cmp::min(data.len() - start, buf.remaining());
            buf.put_slice(&data[start..start + len]);
            this.position += len as u64;
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let start = this.offset()?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= MAX_STREAM_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write past the maximum file size"))?;
        let mut data = this.content.lock();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        this.position = end as u64;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for MemoryStream {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let len = this.content.lock().len() as u64;
        let target = match position {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => this.position.checked_add_signed(delta),
        };
        this.position =
            target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek outside the addressable range"))?;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

    fn backend() -> VirtualBackend {
        VirtualBackend::new("mem")
    }

    #[tokio::test]
    async fn test_all_roots_exist() {
        let backend = backend();
        for folder in KnownFolder::ROOTS {
            let root = backend.known_folder(folder).await.unwrap();
            assert_eq!(backend.probe(&root.path).await.unwrap(), ExistenceResult::FolderExists);
        }
        assert!(matches!(
            backend.known_folder(KnownFolder::Path).await,
            Err(PfsError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_is_one_level_deep() {
        let backend = backend();
        let docs = VirtualPath::new("mem", "/Libraries/Documents");
        backend.create_directory(&docs.join("sub")).await.unwrap();
        backend.create_file(&docs.join("sub/inner.txt")).await.unwrap();
        backend.create_file(&docs.join("a.txt")).await.unwrap();

        let names: Vec<_> = backend
            .list_directory(&docs)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path.name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn test_delete_directory_removes_subtree_only() {
        let backend = backend();
        let base = VirtualPath::new("mem", "/LocalState");
        backend.create_directory(&base.join("a")).await.unwrap();
        backend.create_file(&base.join("a/x")).await.unwrap();
        backend.create_file(&base.join("ab")).await.unwrap();

        backend.delete_directory(&base.join("a")).await.unwrap();
        assert!(!backend.probe(&base.join("a/x")).await.unwrap().exists());
        assert!(backend.probe(&base.join("ab")).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let backend = backend();
        let err = backend
            .create_file(&VirtualPath::new("mem", "/missing/a.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_native_create_entry_generates_unique_names() {
        let backend = backend();
        let parent = VirtualPath::new("mem", "/LocalState");
        let cancel = CancellationToken::new();
        let policy = CreationCollisionOption::GenerateUniqueName;

        let first = backend.create_entry(&parent, "a.txt", EntryKind::File, policy, &cancel).await.unwrap();
        let second = backend.create_entry(&parent, "a.txt", EntryKind::File, policy, &cancel).await.unwrap();
        assert_eq!(first.name(), Some("a.txt"));
        assert_eq!(second.name(), Some("a (2).txt"));
    }

    #[tokio::test]
    async fn test_native_move_keeps_open_streams() {
        let backend = backend();
        let source = VirtualPath::new("mem", "/LocalState/a.txt");
        backend.create_file(&source).await.unwrap();
        let mut stream = backend.open(&source, FileAccess::ReadWrite).await.unwrap();
        stream.write_all(b"hello").await.unwrap();

        let moved = backend
            .move_file(
                &source,
                &VirtualPath::new("mem", "/Personal"),
                "b.txt",
                NameCollisionOption::FailIfExists,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        stream.write_all(b" world").await.unwrap();

        assert_eq!(&backend.read_file(&moved).await.unwrap()[..], b"hello world");
        assert!(!backend.probe(&source).await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_memory_stream_seek_and_read() {
        let backend = backend();
        let path = VirtualPath::new("mem", "/LocalState/a.txt");
        backend.create_file(&path).await.unwrap();
        backend
            .write_file(&path, Bytes::from_static(b"0123456789"), &WriteOptions::truncate())
            .await
            .unwrap();

        let mut stream = backend.open(&path, FileAccess::Read).await.unwrap();
        assert_eq!(stream.seek(SeekFrom::End(-3)).await.unwrap(), 7);
        let mut tail = String::new();
        stream.read_to_string(&mut tail).await.unwrap();
        assert_eq!(tail, "789");
        assert!(stream.write_all(b"x").await.is_err());
        assert!(stream.seek(SeekFrom::Current(-20)).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_stream_rejects_writes_past_the_size_limit() {
        let backend = backend();
        let path = VirtualPath::new("mem", "/LocalState/huge.bin");
        backend.create_file(&path).await.unwrap();

        let mut stream = backend.open(&path, FileAccess::ReadWrite).await.unwrap();
        stream.seek(SeekFrom::Start(u64::MAX - 1)).await.unwrap();
        let err = stream.write_all(b"abcd").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        stream.seek(SeekFrom::Start(MAX_STREAM_LEN as u64)).await.unwrap();
        let err = stream.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(backend.read_file(&path).await.unwrap().is_empty());

        stream.seek(SeekFrom::Start(2)).await.unwrap();
        stream.write_all(b"ok").await.unwrap();
        assert_eq!(&backend.read_file(&path).await.unwrap()[..], b"\0\0ok");
    }

    #[tokio::test]
    async fn test_memory_stream_seeks_relative_to_high_positions() {
        let mut stream = MemoryStream::new(Content::default());
        let high = i64::MAX as u64 + 10;
        assert_eq!(stream.seek(SeekFrom::Start(high)).await.unwrap(), high);
        assert_eq!(stream.seek(SeekFrom::Current(-10)).await.unwrap(), i64::MAX as u64);
        assert!(stream.seek(SeekFrom::Current(i64::MAX)).await.is_err());
        assert!(stream.seek(SeekFrom::End(-1)).await.is_err());
    }
}
