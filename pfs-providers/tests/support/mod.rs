// SPDX-License-Identifier: AGPL-3.0-or-later
#![allow(dead_code)]

use pfs_core::{FileSystem, KnownFolder, Scheduler};
use pfs_providers::{LocalBackend, SandboxBackend, VirtualBackend};
use std::sync::Arc;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A file system plus the temp dirs backing it
pub struct Harness {
    pub label: &'static str,
    pub fs: FileSystem,
    _dirs: Vec<TempDir>,
}

pub fn virtual_fs() -> Harness {
    Harness {
        label: "virtual",
        fs: FileSystem::new(Arc::new(VirtualBackend::new("virtual")), scheduler()),
        _dirs: Vec::new(),
    }
}

pub fn local_fs() -> Harness {
    let root = TempDir::new().unwrap();
    let mut backend = LocalBackend::new("local", root.path());
    let layout = [
        (KnownFolder::Local, "appdata/local"),
        (KnownFolder::Roaming, "appdata/roaming"),
        (KnownFolder::Personal, "home"),
        (KnownFolder::Documents, "home/Documents"),
        (KnownFolder::Music, "home/Music"),
        (KnownFolder::Pictures, "home/Pictures"),
        (KnownFolder::Videos, "home/Videos"),
    ];
    for (folder, dir) in layout {
        let real = root.path().join(dir);
        std::fs::create_dir_all(&real).unwrap();
        backend = backend.with_known_folder(folder, real);
    }
    Harness {
        label: "local",
        fs: FileSystem::new(Arc::new(backend), scheduler()),
        _dirs: vec![root],
    }
}

pub fn sandbox_backend() -> (Arc<SandboxBackend>, Vec<TempDir>) {
    let container = TempDir::new().unwrap();
    let external = TempDir::new().unwrap();
    let backend = Arc::new(SandboxBackend::new("sandbox", container.path(), external.path()));
    (backend, vec![container, external])
}

pub fn sandbox_fs() -> Harness {
    let (backend, dirs) = sandbox_backend();
    Harness {
        label: "sandbox",
        fs: FileSystem::new(backend, scheduler()),
        _dirs: dirs,
    }
}

/// One harness per backend; every backend must agree on collision behavior.
pub fn all() -> Vec<Harness> {
    vec![virtual_fs(), local_fs(), sandbox_fs()]
}

fn scheduler() -> Scheduler {
    Scheduler::current().unwrap()
}
