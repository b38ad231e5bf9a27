// SPDX-License-Identifier: AGPL-3.0-or-later
//! Probe-then-act collision handling for backends without native support
//!
//! Not atomic: another writer can claim a name between the probe and the
//! create/rename below. Such races surface as whatever the primitive
//! reports, usually `AlreadyExists` or `NotFound`.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    backend::StorageBackend,
    collision::{self, Resolution},
    entry::EntryKind,
    error::{PfsError, PfsResult},
    operations::{CreationCollisionOption, NameCollisionOption},
    VirtualPath,
};

pub async fn create_entry<B>(
    backend: &B,
    parent: &VirtualPath,
    desired: &str,
    kind: EntryKind,
    policy: CreationCollisionOption,
    cancel: &CancellationToken,
) -> PfsResult<VirtualPath>
where
    B: StorageBackend + ?Sized,
{
    let path = match collision::resolve(backend, parent, desired, kind, policy, cancel).await? {
        Resolution::UseExisting(path) => return Ok(path),
        Resolution::Replace(path) => {
            debug!(backend = backend.id(), %path, "replacing existing {}", kind.describe());
            match kind {
                EntryKind::File => backend.delete_file(&path).await?,
                EntryKind::Directory => backend.delete_directory(&path).await?,
            }
            path
        }
        Resolution::Create(path) => path,
    };

    match kind {
        EntryKind::File => backend.create_file(&path).await?,
        EntryKind::Directory => backend.create_directory(&path).await?,
    }
    Ok(path)
}

pub async fn move_file<B>(
    backend: &B,
    source: &VirtualPath,
    dest_parent: &VirtualPath,
    desired: &str,
    policy: NameCollisionOption,
    cancel: &CancellationToken,
) -> PfsResult<VirtualPath>
where
    B: StorageBackend + ?Sized,
{
    collision::validate_name(desired)?;
    if backend.probe(source).await?.kind() != Some(EntryKind::File) {
        return Err(PfsError::NotFound(source.to_string()));
    }
    let target = dest_parent.join(desired);
    if target == *source {
        return Ok(source.clone());
    }
    // A case-only rename probes as occupied by the source itself.
    if backend.same_entry(source, &target).await? {
        debug!(backend = backend.id(), from = %source, to = %target, "renaming in place");
        backend.rename(source, &target).await?;
        return Ok(target);
    }

    let resolution =
        collision::resolve(backend, dest_parent, desired, EntryKind::File, policy.into(), cancel).await?;
    if let Resolution::Replace(path) = &resolution {
        debug!(backend = backend.id(), %path, "replacing existing file");
        backend.delete_file(path).await?;
    }

    let dest = resolution.into_path();
    backend.rename(source, &dest).await?;
    Ok(dest)
}
