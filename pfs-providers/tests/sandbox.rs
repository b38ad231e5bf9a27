// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sandboxed container restrictions

mod support;

use pfs_core::{CancellationToken, CreationCollisionOption, FileSystem, NameCollisionOption, PfsError, Scheduler};

#[tokio::test]
async fn test_roaming_is_unsupported_not_missing() {
    support::init_tracing();
    let h = support::sandbox_fs();
    let cancel = CancellationToken::new();
    let err = h.fs.roaming_storage(&cancel).await.unwrap_err();
    assert!(matches!(err, PfsError::Unsupported(_)), "{err}");
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_libraries_need_mounted_external_storage() {
    let (backend, _dirs) = support::sandbox_backend();
    let fs = FileSystem::new(backend.clone(), Scheduler::current().unwrap());
    let cancel = CancellationToken::new();

    assert!(fs.pictures_folder(&cancel).await.is_ok());
    backend.set_external_mounted(false);
    for result in [
        fs.documents_folder(&cancel).await,
        fs.music_folder(&cancel).await,
        fs.pictures_folder(&cancel).await,
        fs.videos_folder(&cancel).await,
    ] {
        assert!(matches!(result, Err(PfsError::Unsupported(_))));
    }
    assert!(fs.local_storage(&cancel).await.is_ok());
    assert!(fs.personal_storage(&cancel).await.is_ok());

    backend.set_external_mounted(true);
    assert!(fs.videos_folder(&cancel).await.is_ok());
}

#[tokio::test]
async fn test_move_across_volumes_keeps_both_files() {
    let cancel = CancellationToken::new();
    let h = support::sandbox_fs();
    let local = h.fs.local_storage(&cancel).await.unwrap();
    let docs = h.fs.documents_folder(&cancel).await.unwrap();

    let existing = docs.create_file("a.txt", CreationCollisionOption::FailIfExists, &cancel).await.unwrap();
    existing.write_all_text("external", &cancel).await.unwrap();
    let mut file = local.create_file("a.txt", CreationCollisionOption::FailIfExists, &cancel).await.unwrap();
    file.write_all_text("internal", &cancel).await.unwrap();

    let err = file
        .move_into(&docs, NameCollisionOption::ReplaceExisting, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PfsError::Unsupported(_)), "{err}");
    assert_eq!(existing.read_all_text(&cancel).await.unwrap(), "external");
    assert_eq!(file.read_all_text(&cancel).await.unwrap(), "internal");
}

#[tokio::test]
async fn test_moves_within_a_volume_work() {
    let cancel = CancellationToken::new();
    let h = support::sandbox_fs();
    let docs = h.fs.documents_folder(&cancel).await.unwrap();
    let pictures = h.fs.pictures_folder(&cancel).await.unwrap();

    let mut file = docs.create_file("scan.png", CreationCollisionOption::FailIfExists, &cancel).await.unwrap();
    file.move_into(&pictures, NameCollisionOption::FailIfExists, &cancel).await.unwrap();
    assert_eq!(file.path().to_path_string(), "/external/Pictures/scan.png");
}
