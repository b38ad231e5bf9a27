// SPDX-License-Identifier: AGPL-3.0-or-later
//! Portable FS Core
//!
//! One file/folder API over heterogeneous storage backends. Name collisions
//! on create, rename and move are resolved by a single algorithm
//! ([`collision`]) so every backend behaves the same for a given policy.

pub mod backend;
pub mod collision;
pub mod emulate;
pub mod entry;
pub mod error;
pub mod file;
pub mod filesystem;
pub mod folder;
pub mod operations;
pub mod path;
pub mod probe;
pub mod schedule;
pub mod stream;

pub use backend::{KnownFolder, RootFolder, StorageBackend, StorageCapabilities};
pub use collision::Resolution;
pub use entry::{Entry, EntryKind, StorageItem};
pub use error::{PfsError, PfsResult};
pub use file::StorageFile;
pub use filesystem::FileSystem;
pub use folder::StorageFolder;
pub use operations::{CreationCollisionOption, FileAccess, NameCollisionOption, WriteOptions};
pub use path::VirtualPath;
pub use probe::{ExistenceResult, PathProbe};
pub use schedule::Scheduler;
pub use stream::{FileStream, ReadOnly};
pub use tokio_util::sync::CancellationToken;
