// SPDX-License-Identifier: AGPL-3.0-or-later
//! Directory listing entries

use crate::{probe::ExistenceResult, VirtualPath};
use serde::{Deserialize, Serialize};

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// The probe result an existing entry of this kind produces.
    pub fn existence(self) -> ExistenceResult {
        match self {
            EntryKind::File => ExistenceResult::FileExists,
            EntryKind::Directory => ExistenceResult::FolderExists,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "folder",
        }
    }
}

/// A child reported by a backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: VirtualPath,
    pub kind: EntryKind,
}

impl Entry {
    pub fn file(path: VirtualPath) -> Self {
        Self { path, kind: EntryKind::File }
    }

    pub fn directory(path: VirtualPath) -> Self {
        Self { path, kind: EntryKind::Directory }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }
}

/// Identity shared by file and folder handles.
///
/// `name()` is always the last segment of `path()`.
pub trait StorageItem {
    fn name(&self) -> &str;
    fn path(&self) -> &VirtualPath;
}
