// SPDX-License-Identifier: AGPL-3.0-or-later
//! Name-collision resolution
//!
//! Every backend funnels creation, rename and move conflicts through this
//! module so that a given policy behaves identically everywhere. The
//! resolver only decides; deleting a replaced entry and materializing the
//! new one is left to the caller of [`Resolution`].
//!
//! Two drivers share the decision logic: [`resolve`] probes through an async
//! [`PathProbe`], and [`resolve_with`] takes a synchronous closure so a
//! backend can resolve while holding its own lock.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    entry::EntryKind,
    error::{PfsError, PfsResult},
    operations::CreationCollisionOption,
    probe::{ExistenceResult, PathProbe},
    VirtualPath,
};

/// Where an entry should end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing occupies the path; create the entry there
    Create(VirtualPath),
    /// A same-kind entry occupies the path; delete it, then create
    Replace(VirtualPath),
    /// Reuse the entry already at the path
    UseExisting(VirtualPath),
}

impl Resolution {
    pub fn path(&self) -> &VirtualPath {
        match self {
            Resolution::Create(p) | Resolution::Replace(p) | Resolution::UseExisting(p) => p,
        }
    }

    pub fn into_path(self) -> VirtualPath {
        match self {
            Resolution::Create(p) | Resolution::Replace(p) | Resolution::UseExisting(p) => p,
        }
    }
}

/// Reject names that are not a single path segment.
pub fn validate_name(name: &str) -> PfsResult<()> {
    if name.is_empty() {
        return Err(PfsError::InvalidArgument("name must not be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(PfsError::InvalidArgument(format!("reserved name: {name}")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(PfsError::InvalidArgument(format!(
            "name must not contain path separators: {name}"
        )));
    }
    Ok(())
}

/// Split a name into stem and extension (extension keeps its dot).
///
/// Folders never have an extension, and a dot in leading position does not
/// start one: `.env` is all stem.
pub fn split_name(name: &str, kind: EntryKind) -> (&str, &str) {
    if kind == EntryKind::Directory {
        return (name, "");
    }
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Candidate names `stem (2).ext`, `stem (3).ext`, ...
#[derive(Debug, Clone)]
pub struct UniqueNames<'a> {
    stem: &'a str,
    extension: &'a str,
    next: Option<u64>,
}

impl<'a> UniqueNames<'a> {
    pub fn new(desired: &'a str, kind: EntryKind) -> Self {
        let (stem, extension) = split_name(desired, kind);
        Self { stem, extension, next: Some(2) }
    }
}

impl Iterator for UniqueNames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let n = self.next?;
        self.next = n.checked_add(1);
        Some(format!("{} ({}){}", self.stem, n, self.extension))
    }
}

enum Collision {
    Open,
    Replace,
    Rename,
}

fn on_collision(
    policy: CreationCollisionOption,
    kind: EntryKind,
    existing: ExistenceResult,
    path: &VirtualPath,
) -> PfsResult<Collision> {
    let same_kind = existing.kind() == Some(kind);
    match policy {
        CreationCollisionOption::FailIfExists => Err(PfsError::AlreadyExists(path.to_string())),
        CreationCollisionOption::GenerateUniqueName => Ok(Collision::Rename),
        CreationCollisionOption::OpenIfExists if same_kind => Ok(Collision::Open),
        CreationCollisionOption::ReplaceExisting if same_kind => Ok(Collision::Replace),
        CreationCollisionOption::OpenIfExists | CreationCollisionOption::ReplaceExisting => {
            let found = existing.kind().map_or("entry", EntryKind::describe);
            Err(PfsError::AlreadyExists(format!(
                "{path} is a {found}, expected a {}",
                kind.describe()
            )))
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> PfsResult<()> {
    if cancel.is_cancelled() {
        return Err(PfsError::Cancelled);
    }
    Ok(())
}

enum Step {
    Probe(VirtualPath),
    Done(Resolution),
}

/// Decision state shared by both drivers; each driver only supplies probes.
struct Search<'a> {
    parent: &'a VirtualPath,
    desired: &'a str,
    kind: EntryKind,
    policy: CreationCollisionOption,
    unique: Option<UniqueNames<'a>>,
}

impl<'a> Search<'a> {
    fn start(
        parent: &'a VirtualPath,
        desired: &'a str,
        kind: EntryKind,
        policy: CreationCollisionOption,
        cancel: &CancellationToken,
    ) -> PfsResult<(Self, VirtualPath)> {
        validate_name(desired)?;
        check_cancelled(cancel)?;
        let search = Self {
            parent,
            desired,
            kind,
            policy,
            unique: None,
        };
        Ok((search, parent.join(desired)))
    }

    /// Feed the result of probing `path`; returns the next path to probe or the outcome.
    fn advance(
        &mut self,
        path: VirtualPath,
        existing: ExistenceResult,
        cancel: &CancellationToken,
    ) -> PfsResult<Step> {
        if !existing.exists() {
            return Ok(self.settle(Resolution::Create(path)));
        }
        if self.unique.is_none() {
            match on_collision(self.policy, self.kind, existing, &path)? {
                Collision::Open => return Ok(self.settle(Resolution::UseExisting(path))),
                Collision::Replace => return Ok(self.settle(Resolution::Replace(path))),
                Collision::Rename => self.unique = Some(UniqueNames::new(self.desired, self.kind)),
            }
        }
        check_cancelled(cancel)?;
        match self.unique.as_mut().and_then(|names| names.next()) {
            Some(name) => Ok(Step::Probe(self.parent.join(&name))),
            None => Err(PfsError::AlreadyExists(self.parent.join(self.desired).to_string())),
        }
    }

    fn settle(&self, resolution: Resolution) -> Step {
        if self.unique.is_some() || !matches!(resolution, Resolution::Create(_)) {
            debug!(
                desired = self.desired,
                policy = ?self.policy,
                resolved = %resolution.path(),
                "resolved name collision"
            );
        }
        Step::Done(resolution)
    }
}

/// Resolve `desired` inside `parent` by probing through `probe`.
pub async fn resolve<P>(
    probe: &P,
    parent: &VirtualPath,
    desired: &str,
    kind: EntryKind,
    policy: CreationCollisionOption,
    cancel: &CancellationToken,
) -> PfsResult<Resolution>
where
    P: PathProbe + ?Sized,
{
    let (mut search, mut path) = Search::start(parent, desired, kind, policy, cancel)?;
    loop {
        let existing = probe.probe(&path).await?;
        match search.advance(path, existing, cancel)? {
            Step::Probe(next) => path = next,
            Step::Done(resolution) => return Ok(resolution),
        }
    }
}

/// Resolve `desired` inside `parent` with a synchronous probe.
pub fn resolve_with<F>(
    parent: &VirtualPath,
    desired: &str,
    kind: EntryKind,
    policy: CreationCollisionOption,
    cancel: &CancellationToken,
    mut probe: F,
) -> PfsResult<Resolution>
where
    F: FnMut(&VirtualPath) -> ExistenceResult,
{
    let (mut search, mut path) = Search::start(parent, desired, kind, policy, cancel)?;
    loop {
        let existing = probe(&path);
        match search.advance(path, existing, cancel)? {
            Step::Probe(next) => path = next,
            Step::Done(resolution) => return Ok(resolution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapProbe(HashMap<VirtualPath, ExistenceResult>);

    impl MapProbe {
        fn with(entries: &[(&str, ExistenceResult)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(p, r)| (VirtualPath::new("mem", p), *r))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl PathProbe for MapProbe {
        async fn probe(&self, path: &VirtualPath) -> PfsResult<ExistenceResult> {
            Ok(self.0.get(path).copied().unwrap_or(ExistenceResult::NotFound))
        }
    }

    /// Everything exists; cancels the token after `limit` probes.
    struct FloodProbe {
        probes: AtomicUsize,
        limit: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl PathProbe for FloodProbe {
        async fn probe(&self, _path: &VirtualPath) -> PfsResult<ExistenceResult> {
            if self.probes.fetch_add(1, Ordering::SeqCst) + 1 == self.limit {
                self.cancel.cancel();
            }
            Ok(ExistenceResult::FileExists)
        }
    }

    fn docs() -> VirtualPath {
        VirtualPath::new("mem", "/docs")
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.txt", EntryKind::File), ("a", ".txt"));
        assert_eq!(split_name("archive.tar.gz", EntryKind::File), ("archive.tar", ".gz"));
        assert_eq!(split_name("README", EntryKind::File), ("README", ""));
        assert_eq!(split_name(".env", EntryKind::File), (".env", ""));
        assert_eq!(split_name("photos.2024", EntryKind::Directory), ("photos.2024", ""));
    }

    #[test]
    fn test_unique_names_sequence() {
        let names: Vec<String> = UniqueNames::new("a.txt", EntryKind::File).take(3).collect();
        assert_eq!(names, vec!["a (2).txt", "a (3).txt", "a (4).txt"]);

        let first = UniqueNames::new("Music", EntryKind::Directory).next();
        assert_eq!(first.as_deref(), Some("Music (2)"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "a\0b"] {
            assert!(matches!(validate_name(bad), Err(PfsError::InvalidArgument(_))), "{bad:?}");
        }
    }

    async fn resolve_fresh(
        probe: &MapProbe,
        desired: &str,
        kind: EntryKind,
        policy: CreationCollisionOption,
    ) -> PfsResult<Resolution> {
        resolve(probe, &docs(), desired, kind, policy, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_free_name_creates() {
        let probe = MapProbe::with(&[]);
        let res = resolve_fresh(&probe, "a.txt", EntryKind::File, CreationCollisionOption::FailIfExists)
            .await
            .unwrap();
        assert_eq!(res, Resolution::Create(docs().join("a.txt")));
    }

    #[tokio::test]
    async fn test_fail_if_exists() {
        let probe = MapProbe::with(&[("/docs/a.txt", ExistenceResult::FileExists)]);
        let err = resolve_fresh(&probe, "a.txt", EntryKind::File, CreationCollisionOption::FailIfExists)
            .await
            .unwrap_err();
        assert!(matches!(err, PfsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_open_and_replace_same_kind() {
        let probe = MapProbe::with(&[("/docs/a.txt", ExistenceResult::FileExists)]);

        let open = resolve_fresh(&probe, "a.txt", EntryKind::File, CreationCollisionOption::OpenIfExists)
            .await
            .unwrap();
        assert_eq!(open, Resolution::UseExisting(docs().join("a.txt")));

        let replace = resolve_fresh(&probe, "a.txt", EntryKind::File, CreationCollisionOption::ReplaceExisting)
            .await
            .unwrap();
        assert_eq!(replace, Resolution::Replace(docs().join("a.txt")));
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_already_exists() {
        let probe = MapProbe::with(&[("/docs/a", ExistenceResult::FolderExists)]);
        for policy in [CreationCollisionOption::OpenIfExists, CreationCollisionOption::ReplaceExisting] {
            let err = resolve_fresh(&probe, "a", EntryKind::File, policy).await.unwrap_err();
            assert!(matches!(err, PfsError::AlreadyExists(_)), "{policy}");
        }
    }

    #[tokio::test]
    async fn test_generate_unique_skips_taken_names() {
        let probe = MapProbe::with(&[
            ("/docs/a.txt", ExistenceResult::FileExists),
            ("/docs/a (2).txt", ExistenceResult::FileExists),
            ("/docs/a (3).txt", ExistenceResult::FolderExists),
        ]);
        let res = resolve_fresh(&probe, "a.txt", EntryKind::File, CreationCollisionOption::GenerateUniqueName)
            .await
            .unwrap();
        assert_eq!(res, Resolution::Create(docs().join("a (4).txt")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let probe = MapProbe::with(&[]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = CreationCollisionOption::GenerateUniqueName;
        let err = resolve(&probe, &docs(), "a.txt", EntryKind::File, policy, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_mid_loop_stops_promptly() {
        let cancel = CancellationToken::new();
        let probe = FloodProbe {
            probes: AtomicUsize::new(0),
            limit: 50,
            cancel: cancel.clone(),
        };
        let policy = CreationCollisionOption::GenerateUniqueName;
        let err = resolve(&probe, &docs(), "a.txt", EntryKind::File, policy, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(probe.probes.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_sync_and_async_drivers_agree() {
        let probe = MapProbe::with(&[
            ("/docs/a.txt", ExistenceResult::FileExists),
            ("/docs/a (2).txt", ExistenceResult::FileExists),
            ("/docs/notes", ExistenceResult::FolderExists),
        ]);
        let cancel = CancellationToken::new();
        let cases = [
            ("a.txt", EntryKind::File, CreationCollisionOption::GenerateUniqueName),
            ("a.txt", EntryKind::File, CreationCollisionOption::OpenIfExists),
            ("a.txt", EntryKind::File, CreationCollisionOption::ReplaceExisting),
            ("a.txt", EntryKind::File, CreationCollisionOption::FailIfExists),
            ("notes", EntryKind::File, CreationCollisionOption::ReplaceExisting),
            ("fresh", EntryKind::Directory, CreationCollisionOption::FailIfExists),
        ];
        for (name, kind, policy) in cases {
            let async_result = resolve(&probe, &docs(), name, kind, policy, &cancel).await;
            let sync_result = resolve_with(&docs(), name, kind, policy, &cancel, |p| {
                probe.0.get(p).copied().unwrap_or(ExistenceResult::NotFound)
            });
            match (async_result, sync_result) {
                (Ok(a), Ok(s)) => assert_eq!(a, s, "{name} {policy}"),
                (Err(a), Err(s)) => assert_eq!(a.to_string(), s.to_string(), "{name} {policy}"),
                (a, s) => panic!("drivers disagree for {name} {policy}: {a:?} vs {s:?}"),
            }
        }
    }

    #[test]
    fn test_sync_driver_matches_async_rules() {
        let cancel = CancellationToken::new();
        let taken = [docs().join("notes"), docs().join("notes (2)")];
        let policy = CreationCollisionOption::GenerateUniqueName;
        let res = resolve_with(&docs(), "notes", EntryKind::Directory, policy, &cancel, |p| {
            if taken.contains(p) {
                ExistenceResult::FolderExists
            } else {
                ExistenceResult::NotFound
            }
        })
        .unwrap();
        assert_eq!(res, Resolution::Create(docs().join("notes (3)")));

        let policy = CreationCollisionOption::OpenIfExists;
        let err = resolve_with(&docs(), "", EntryKind::File, policy, &cancel, |_| ExistenceResult::NotFound)
            .unwrap_err();
        assert!(matches!(err, PfsError::InvalidArgument(_)));
    }
}
