//! Sync orchestrator: read dispatch without write-path ordering.

use std::future::Future;
use std::sync::Arc;

use quarry_core::{Error, LifecycleState, Result, StateHandle};

use super::InFlight;

/// Runs reads on the caller's task, gated only by lifecycle state.
#[derive(Debug)]
pub struct SyncOrchestrator {
    state: StateHandle,
    in_flight: Arc<InFlight>,
}

impl SyncOrchestrator {
    /// Create a stopped orchestrator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: StateHandle::new(name),
            in_flight: Arc::new(InFlight::default()),
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

    /// Start accepting reads.
    pub fn start(&self) -> Result<()> {
        if self
            .state
            .transition(&LifecycleState::Stopped, LifecycleState::Started)
        {
            tracing::debug!(orchestrator = %self.name(), "sync orchestrator started");
            Ok(())
        } else {
            Err(Error::operation(format!(
                "Cannot start '{}' while {}",
                self.name(),
                self.state()
            )))
        }
    }

    /// Run a read. Errors surface directly to the caller.
    pub async fn run<F, T>(&self, read: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = InFlight::enter(&self.in_flight);
        self.state.ensure_accepts_work()?;
        read.await
    }

    /// Stop accepting reads and wait for running ones.
    pub async fn stop(&self) -> Result<()> {
        if !self
            .state
            .transition(&LifecycleState::Started, LifecycleState::Stopping)
        {
            return Ok(());
        }
        self.in_flight.wait_idle().await;
        self.state.set_state(LifecycleState::Stopped);
        tracing::debug!(orchestrator = %self.name(), "sync orchestrator stopped");
        Ok(())
    }
}
