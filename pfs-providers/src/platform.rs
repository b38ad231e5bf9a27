// SPDX-License-Identifier: AGPL-3.0-or-later
//! Platform detection
//!
//! Supports: Linux, macOS, Windows, iOS, Android

use pfs_core::PfsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend implementations this crate can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Real filesystem with OS-defined known folders
    Local,
    /// Mobile app container with internal and external volumes
    Sandbox,
    /// In-memory store with atomic collision handling
    Virtual,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Local, BackendKind::Sandbox, BackendKind::Virtual];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Sandbox => "sandbox",
            BackendKind::Virtual => "virtual",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = PfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| PfsError::InvalidArgument(format!("unknown backend kind: {s}")))
    }
}

/// Target platform families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Ios,
    Android,
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        #[cfg(target_os = "linux")]
        return Platform::Linux;

        #[cfg(target_os = "macos")]
        return Platform::MacOs;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(target_os = "ios")]
        return Platform::Ios;

        #[cfg(target_os = "android")]
        return Platform::Android;

        #[cfg(not(any(
            target_os = "linux",
            target_os = "macos",
            target_os = "windows",
            target_os = "ios",
            target_os = "android"
        )))]
        return Platform::Other;
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }

    /// Backend used when configuration does not name one
    pub fn default_backend(self) -> BackendKind {
        if self.is_mobile() {
            BackendKind::Sandbox
        } else {
            BackendKind::Local
        }
    }
}
