// SPDX-License-Identifier: AGPL-3.0-or-later
//! Moving backend I/O off the caller's execution context
//!
//! Every entity operation runs its backend work through a [`Scheduler`]: the
//! work is spawned onto a worker runtime and the caller awaits its
//! completion. Point the scheduler at a dedicated multi-threaded runtime when
//! callers live on a constrained (e.g. single-threaded UI) runtime.

use std::future::Future;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::{PfsError, PfsResult};

#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// Schedule onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running on.
    pub fn current() -> PfsResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| PfsError::Scheduler(e.to_string()))
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run `work` on the worker runtime and wait for its result.
    ///
    /// Fails with `Cancelled` without starting `work` if `cancel` has already
    /// fired. Work that is running keeps its own clone of the token.
    pub async fn run<F, T>(&self, cancel: &CancellationToken, work: F) -> PfsResult<T>
    where
        F: Future<Output = PfsResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PfsError::Cancelled);
        }
        match self.handle.spawn(work).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(PfsError::Scheduler(e.to_string())),
        }
    }
}
