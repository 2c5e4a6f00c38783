//! Work orchestrators.
//!
//! - [`SerialOrchestrator`]: one per shard, applies mutations in strict
//!   acceptance order through a bounded queue.
//! - [`ParallelOrchestrator`]: shared per index, fans out commuting shard jobs.
//! - [`SyncOrchestrator`]: shared per index, dispatches reads on the caller's
//!   task so queries never wait behind queued writes.
//!
//! All three follow the lifecycle in [`quarry_core::lifecycle`]. Failures of
//! accepted work go to a [`FailureHandler`]; handles only say whether the
//! work was applied.

pub mod failure;
pub mod parallel;
pub mod serial;
pub mod sync;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, oneshot};

pub use failure::{FailureContext, FailureHandler, LoggingFailureHandler};
pub use parallel::ParallelOrchestrator;
pub use serial::{SerialOrchestrator, SerialSettings, WorkFor};
pub use sync::SyncOrchestrator;

/// Final outcome of an accepted work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Applied, with the requested visibility.
    Applied,
    /// Not applied (or not made visible); the failure handler was notified.
    Failed,
}

/// Completion handle of an accepted work item.
#[derive(Debug)]
pub struct WorkHandle {
    rx: oneshot::Receiver<WorkOutcome>,
}

impl WorkHandle {
    pub(crate) fn new(rx: oneshot::Receiver<WorkOutcome>) -> Self {
        Self { rx }
    }

    /// Wait for the work to complete.
    pub async fn wait(self) -> WorkOutcome {
        self.rx.await.unwrap_or(WorkOutcome::Failed)
    }

    /// Handle that completes once every handle has completed.
    ///
    /// Must be called within a tokio runtime when more than one handle is
    /// given.
    pub fn combine(mut handles: Vec<WorkHandle>) -> WorkHandle {
        if handles.len() == 1
            && let Some(handle) = handles.pop()
        {
            return handle;
        }
        let (done, rx) = oneshot::channel();
        if handles.is_empty() {
            let _ = done.send(WorkOutcome::Applied);
        } else {
            tokio::spawn(async move {
                let _ = done.send(wait_all(handles).await);
            });
        }
        WorkHandle::new(rx)
    }
}

/// Wait for every handle; `Applied` only if all were applied.
pub async fn wait_all(handles: Vec<WorkHandle>) -> WorkOutcome {
    let outcomes = futures::future::join_all(handles.into_iter().map(WorkHandle::wait)).await;
    if outcomes.iter().all(|o| *o == WorkOutcome::Applied) {
        WorkOutcome::Applied
    } else {
        WorkOutcome::Failed
    }
}

/// Counts running operations so `stop` can wait for them.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub(crate) fn enter(this: &Arc<Self>) -> InFlightGuard {
        this.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(Arc::clone(this))
    }

    pub(crate) async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

pub(crate) struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
