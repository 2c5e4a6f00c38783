//! Parallel orchestrator: bounded fan-out of commuting shard jobs.
//!
//! Used for administrative operations that are independent per shard, such
//! as merging segments or refreshing every shard. Jobs give no ordering
//! guarantee relative to each other.

use std::future::Future;
use std::sync::Arc;

use quarry_core::{Error, LifecycleState, Result, StateHandle};
use tokio::sync::Semaphore;

use super::failure::{FailureContext, FailureHandler};
use super::{InFlight, WorkHandle, WorkOutcome};

/// Runs independent jobs concurrently, at most `concurrency` at a time.
pub struct ParallelOrchestrator {
    state: StateHandle,
    permits: Arc<Semaphore>,
    concurrency: usize,
    in_flight: Arc<InFlight>,
    failure_handler: Arc<dyn FailureHandler>,
}

impl ParallelOrchestrator {
    /// Create a stopped orchestrator.
    pub fn new(
        name: impl Into<String>,
        concurrency: usize,
        failure_handler: Arc<dyn FailureHandler>,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            state: StateHandle::new(name),
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            in_flight: Arc::new(InFlight::default()),
            failure_handler,
        }
    }

    /// Orchestrator name.
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.state()
    }

    /// Start accepting jobs.
    pub fn start(&self) -> Result<()> {
        if self
            .state
            .transition(&LifecycleState::Stopped, LifecycleState::Started)
        {
            tracing::info!(
                orchestrator = %self.name(),
                concurrency = self.concurrency,
                "parallel orchestrator started"
            );
            Ok(())
        } else {
            Err(Error::operation(format!(
                "Cannot start '{}' while {}",
                self.name(),
                self.state()
            )))
        }
    }

    /// Spawn a job. It starts once a concurrency slot is free.
    ///
    /// `description` identifies the job in failure reports. A job returning
    /// an error is reported here; a job returning [`WorkOutcome::Failed`] has
    /// already been reported by whoever ran it.
    pub fn submit<F>(&self, description: impl Into<String>, job: F) -> Result<WorkHandle>
    where
        F: Future<Output = Result<WorkOutcome>> + Send + 'static,
    {
        self.state.ensure_accepts_work()?;
        let description = description.into();
        let permits = Arc::clone(&self.permits);
        let failure_handler = Arc::clone(&self.failure_handler);
        let orchestrator = self.name().to_string();
        let guard = InFlight::enter(&self.in_flight);
        let (done, handle) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                let _ = done.send(WorkOutcome::Failed);
                return;
            };
            let outcome = match job.await {
                Ok(outcome) => outcome,
                Err(error) => {
                    failure_handler.handle(FailureContext {
                        orchestrator,
                        kind: None,
                        work: description,
                        error,
                    });
                    WorkOutcome::Failed
                }
            };
            let _ = done.send(outcome);
        });
        Ok(WorkHandle::new(handle))
    }

    /// Stop accepting jobs and wait for running and queued ones.
    pub async fn stop(&self) -> Result<()> {
        if !self
            .state
            .transition(&LifecycleState::Started, LifecycleState::Stopping)
        {
            return Ok(());
        }
        self.in_flight.wait_idle().await;
        self.state.set_state(LifecycleState::Stopped);
        tracing::info!(orchestrator = %self.name(), "parallel orchestrator stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ParallelOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelOrchestrator")
            .field("name", &self.name())
            .field("concurrency", &self.concurrency)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
