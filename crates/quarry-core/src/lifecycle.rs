//! Orchestrator lifecycle state management.
//!
//! Provides [`LifecycleState`] and [`StateHandle`] for tracking the lifecycle
//! of work orchestrators.
//!
//! ```text
//! Stopped ──start──▶ Started ──stop──▶ Stopping ──drained──▶ Stopped
//!                      │  ▲
//!              fatal   │  │ recover
//!                      ▼  │
//!                     Broken
//! ```
//!
//! # Usage
//!
//! ```rust
//! use quarry_core::lifecycle::{LifecycleState, StateHandle};
//!
//! let handle = StateHandle::new("books/0");
//! assert_eq!(handle.state(), LifecycleState::Stopped);
//!
//! assert!(handle.transition(&LifecycleState::Stopped, LifecycleState::Started));
//! assert!(handle.state().accepts_work());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, Result};

// ============================================================================
// LifecycleState
// ============================================================================

/// State of an orchestrator in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not started, or fully stopped after draining.
    Stopped,
    /// Operational and accepting submissions.
    Started,
    /// Draining accepted work; new submissions are rejected.
    Stopping,
    /// The underlying writer failed fatally; waiting for recovery.
    Broken(String),
}

impl LifecycleState {
    /// Returns `true` if submissions are accepted in this state.
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Returns `true` if the orchestrator is broken.
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken(_))
    }

    /// Returns `true` if the orchestrator holds no resources.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Broken(reason) => write!(f, "broken: {reason}"),
        }
    }
}

// ============================================================================
// StateHandle
// ============================================================================

/// Thread-safe handle for observing and updating lifecycle state.
///
/// Cheap to clone (Arc internals). State changes are broadcast
/// to all subscribers via a watch channel.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<StateHandleInner>,
}

struct StateHandleInner {
    name: String,
    tx: watch::Sender<LifecycleState>,
}

impl StateHandle {
    /// Create a new state handle with the given name.
    ///
    /// Initial state is [`LifecycleState::Stopped`].
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Stopped);
        Self {
            inner: Arc::new(StateHandleInner {
                name: name.into(),
                tx,
            }),
        }
    }

    /// Get the owner name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the current state.
    pub fn state(&self) -> LifecycleState {
        self.inner.tx.borrow().clone()
    }

    /// Unconditionally update the state.
    pub fn set_state(&self, state: LifecycleState) {
        tracing::debug!(orchestrator = %self.inner.name, %state, "lifecycle transition");
        self.inner.tx.send_replace(state);
    }

    /// Move to `next` only if the current state equals `expected`.
    ///
    /// Returns `true` if the transition happened.
    pub fn transition(&self, expected: &LifecycleState, next: LifecycleState) -> bool {
        let name = &self.inner.name;
        self.inner.tx.send_if_modified(|current| {
            if current != expected {
                return false;
            }
            tracing::debug!(orchestrator = %name, from = %current, to = %next, "lifecycle transition");
            *current = next;
            true
        })
    }

    /// Fail with [`Error::OrchestratorUnavailable`] unless work is accepted.
    pub fn ensure_accepts_work(&self) -> Result<()> {
        let state = self.state();
        if state.accepts_work() {
            Ok(())
        } else {
            Err(Error::OrchestratorUnavailable {
                name: self.inner.name.clone(),
                state: state.to_string(),
            })
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.inner.tx.subscribe()
    }

    /// Wait until the state satisfies `predicate`, or fail after `timeout`.
    pub async fn wait_for<P>(&self, predicate: P, timeout: Duration) -> Result<LifecycleState>
    where
        P: Fn(&LifecycleState) -> bool,
    {
        let mut rx = self.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|state| predicate(state))).await;
        match waited {
            Ok(Ok(state)) => Ok((*state).clone()),
            Ok(Err(_)) => Err(Error::operation(format!(
                "State channel for '{}' closed",
                self.inner.name
            ))),
            Err(_) => Err(Error::operation(format!(
                "'{}' did not reach the expected state after {timeout:?} (state: {})",
                self.inner.name,
                self.state()
            ))),
        }
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
