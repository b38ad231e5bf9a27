// SPDX-License-Identifier: AGPL-3.0-or-later
//! Virtual path abstraction

use serde::{Deserialize, Serialize};
use std::fmt;

const URI_SCHEME: &str = "pfs://";

/// A location inside one backend.
///
/// Paths are always normalized: empty and `.` segments are dropped and `..`
/// pops the previous segment, never climbing above the backend root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualPath {
    /// Identifier of the backend instance that owns this path
    pub backend: String,
    pub segments: Vec<String>,
}

impl VirtualPath {
    pub fn new(backend: impl Into<String>, path: impl AsRef<str>) -> Self {
        Self::root(backend).join(path)
    }

    pub fn root(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            segments: Vec::new(),
        }
    }

    pub fn join(&self, name: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        for part in name.as_ref().split('/').filter(|s| !s.is_empty()) {
            match part {
                "." => {}
                ".." => {
                    segments.pop();
                }
                _ => segments.push(part.to_string()),
            }
        }
        Self {
            backend: self.backend.clone(),
            segments,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            backend: self.backend.clone(),
            segments,
        })
    }

    /// Replace the last segment, keeping the parent.
    pub fn with_name(&self, name: &str) -> Self {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => self.join(name),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when both paths name the same backend id.
    pub fn same_backend(&self, other: &VirtualPath) -> bool {
        self.backend == other.backend
    }

    /// True when `self` equals `ancestor` or lives below it.
    pub fn starts_with(&self, ancestor: &VirtualPath) -> bool {
        self.same_backend(ancestor)
            && self.segments.len() >= ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    pub fn to_path_string(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }

    pub fn to_uri(&self) -> String {
        format!("{}{}{}", URI_SCHEME, self.backend, self.to_path_string())
    }

    pub fn parse_uri(uri: &str) -> Option<Self> {
        let uri = uri.strip_prefix(URI_SCHEME)?;
        let (backend, path) = uri.split_once('/').unwrap_or((uri, ""));
        if backend.is_empty() {
            return None;
        }
        Some(Self::new(backend, path))
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}
