// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage providers for Portable FS
//!
//! Three backends covering the platform families: a desktop filesystem, a
//! sandboxed mobile container and an in-memory virtualized store. The
//! factory picks one at startup from configuration or the build target.

pub mod config;
mod local;
pub mod platform;
mod sandbox;
mod virtualized;

pub use config::{LocalConfig, SandboxConfig, StoreConfig};
pub use local::LocalBackend;
pub use platform::{BackendKind, Platform};
pub use sandbox::{SandboxBackend, Volume};
pub use virtualized::{MemoryStream, VirtualBackend, MAX_STREAM_LEN};

use directories::{ProjectDirs, UserDirs};
use pfs_core::{FileSystem, PfsError, PfsResult, Scheduler, StorageBackend};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds a backend from configuration
pub type BackendConstructor = Box<dyn Fn(&StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> + Send + Sync>;

/// Registry of backend constructors, consulted once at startup
pub struct BackendFactory {
    constructors: HashMap<BackendKind, BackendConstructor>,
}

impl BackendFactory {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Factory with every backend this crate ships
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(BackendKind::Local, build_local);
        factory.register(BackendKind::Sandbox, build_sandbox);
        factory.register(BackendKind::Virtual, build_virtual);
        factory
    }

    pub fn register<F>(&mut self, kind: BackendKind, constructor: F)
    where
        F: Fn(&StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    pub fn is_registered(&self, kind: BackendKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<_> = self.constructors.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn remove(&mut self, kind: BackendKind) -> bool {
        self.constructors.remove(&kind).is_some()
    }

    pub fn build(&self, kind: BackendKind, config: &StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| PfsError::Unsupported(format!("no {kind} backend registered")))?;
        let backend = constructor(config)?;
        info!(%kind, id = backend.id(), "storage backend selected");
        Ok(backend)
    }

    /// Build the configured backend, or the platform default when none is named.
    pub fn select(&self, config: &StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> {
        let kind = config
            .backend
            .unwrap_or_else(|| Platform::detect().default_backend());
        self.build(kind, config)
    }
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_local(config: &StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> {
    Ok(Arc::new(LocalBackend::discover("local", &config.local.root, &config.app_name)))
}

fn build_virtual(_config: &StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> {
    Ok(Arc::new(VirtualBackend::new("virtual")))
}

fn build_sandbox(config: &StoreConfig) -> PfsResult<Arc<dyn StorageBackend>> {
    let container = match &config.sandbox.container {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("", "", &config.app_name)
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| PfsError::Config("no app container directory; set sandbox.container".into()))?,
    };
    let external = match &config.sandbox.external {
        Some(dir) => dir.clone(),
        None => UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| PfsError::Config("no external storage directory; set sandbox.external".into()))?,
    };
    let backend =
        SandboxBackend::new("sandbox", container, external).with_external_mounted(config.sandbox.external_mounted);
    Ok(Arc::new(backend))
}

/// Build the configured backend and wrap it with `scheduler`.
pub fn open_filesystem(config: &StoreConfig, scheduler: Scheduler) -> PfsResult<FileSystem> {
    let backend = BackendFactory::with_defaults().select(config)?;
    Ok(FileSystem::new(backend, scheduler))
}
