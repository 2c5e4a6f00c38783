//! Serial orchestrator: one ordered writer context per shard.
//!
//! Submissions go through a bounded queue into a single worker task which
//! owns the shard writer. The worker drains the queue in batches, applies
//! every work in acceptance order, then runs the commit/refresh actions the
//! IO strategy and the works ask for. Work handles complete only after those
//! visibility actions.
//!
//! Works applied since the last successful commit are remembered; if the
//! writer breaks before committing them, each one is reported to the
//! failure handler, since reopening the writer discards them.

use std::sync::Arc;
use std::time::Duration;

use quarry_core::{Error, LifecycleState, Result, StateHandle};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::backend::ShardWriter;
use crate::io::IoStrategy;
use crate::work::{DocumentCommitStrategy, DocumentRefreshStrategy, IndexingWork, WorkKind};

use super::failure::{FailureContext, FailureHandler};
use super::{WorkHandle, WorkOutcome};

/// Work item type accepted by a serial orchestrator over writer `W`.
pub type WorkFor<W> = IndexingWork<<W as ShardWriter>::Document, <W as ShardWriter>::Value>;

struct Envelope<W: ShardWriter> {
    work: WorkFor<W>,
    done: oneshot::Sender<WorkOutcome>,
}

/// Queue and batch sizing for a serial orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct SerialSettings {
    /// Queue capacity.
    pub queue_size: usize,
    /// Configured batch size, capped by the IO strategy.
    pub max_batch_size: usize,
}

/// Applies mutation works to one shard in strict acceptance order.
pub struct SerialOrchestrator<W: ShardWriter> {
    state: StateHandle,
    sender: RwLock<Option<mpsc::Sender<Envelope<W>>>>,
    worker: Mutex<Option<JoinHandle<bool>>>,
    writer: Arc<Mutex<W>>,
    io: Arc<dyn IoStrategy>,
    failure_handler: Arc<dyn FailureHandler>,
    settings: SerialSettings,
}

impl<W: ShardWriter> SerialOrchestrator<W> {
    /// Create a stopped orchestrator owning `writer`.
    pub fn new(
        name: impl Into<String>,
        writer: W,
        io: Arc<dyn IoStrategy>,
        failure_handler: Arc<dyn FailureHandler>,
        settings: SerialSettings,
    ) -> Self {
        Self {
            state: StateHandle::new(name),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            writer: Arc::new(Mutex::new(writer)),
            io,
            failure_handler,
            settings,
        }
    }

    /// Orchestrator name (`index/shard`).
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.state()
    }

    /// Observable state handle.
    pub fn state_handle(&self) -> &StateHandle {
        &self.state
    }

    /// Spawn the worker and start accepting work.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let current = self.state.state();
        if !current.is_stopped() {
            return Err(Error::operation(format!(
                "Cannot start '{}' while {current}",
                self.name()
            )));
        }

        let (tx, rx) = mpsc::channel(self.settings.queue_size.max(1));
        *self.sender.write().await = Some(tx);

        let task = SerialWorker {
            state: self.state.clone(),
            writer: Arc::clone(&self.writer),
            io: Arc::clone(&self.io),
            failure_handler: Arc::clone(&self.failure_handler),
            max_batch_size: self.io.max_batch_size(self.settings.max_batch_size),
            uncommitted: false,
            stale: false,
            broken: false,
            pending: Vec::new(),
        };
        *worker = Some(tokio::spawn(task.run(rx)));
        self.state.set_state(LifecycleState::Started);

        tracing::info!(
            orchestrator = %self.name(),
            io = self.io.name(),
            queue_size = self.settings.queue_size,
            "serial orchestrator started"
        );
        Ok(())
    }

    /// Enqueue a work, waiting for queue capacity if needed.
    pub async fn submit(&self, work: WorkFor<W>) -> Result<WorkHandle> {
        let sender = self.sender().await?;
        let (done, handle) = oneshot::channel();
        sender
            .send(Envelope { work, done })
            .await
            .map_err(|_| self.unavailable())?;
        Ok(WorkHandle::new(handle))
    }

    /// Enqueue a work, failing with [`Error::QueueFull`] if the queue is full.
    pub async fn try_submit(&self, work: WorkFor<W>) -> Result<WorkHandle> {
        let sender = self.sender().await?;
        let (done, handle) = oneshot::channel();
        sender
            .try_send(Envelope { work, done })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::QueueFull {
                    name: self.name().to_string(),
                },
                mpsc::error::TrySendError::Closed(_) => self.unavailable(),
            })?;
        Ok(WorkHandle::new(handle))
    }

    /// Stop accepting work, drain the queue, commit and close the writer.
    ///
    /// Blocks until every accepted work has been applied or failed.
    pub async fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let current = self.state.state();
        if current.is_stopped() {
            return Ok(());
        }
        self.state.set_state(LifecycleState::Stopping);
        self.sender.write().await.take();

        let mut broken = current.is_broken();
        if let Some(task) = worker.take() {
            match task.await {
                Ok(worker_broken) => broken |= worker_broken,
                Err(e) => {
                    broken = true;
                    tracing::error!(orchestrator = %self.name(), error = %e, "serial worker aborted");
                }
            }
        }

        let mut writer = self.writer.lock().await;
        let mut result = Ok(());
        if !broken {
            result = writer.commit().await;
        }
        let closed = writer.close().await;
        self.state.set_state(LifecycleState::Stopped);
        tracing::info!(orchestrator = %self.name(), broken, "serial orchestrator stopped");
        result.and(closed)
    }

    /// Reopen the writer of a broken orchestrator and resume.
    pub async fn recover(&self) -> Result<()> {
        let current = self.state.state();
        if !current.is_broken() {
            return Err(Error::operation(format!(
                "Cannot recover '{}': it is {current}, not broken",
                self.name()
            )));
        }
        self.writer.lock().await.reopen().await?;
        if self.state.transition(&current, LifecycleState::Started) {
            tracing::info!(orchestrator = %self.name(), "serial orchestrator recovered");
            Ok(())
        } else {
            Err(Error::operation(format!(
                "State of '{}' changed during recovery",
                self.name()
            )))
        }
    }

    async fn sender(&self) -> Result<mpsc::Sender<Envelope<W>>> {
        self.state.ensure_accepts_work()?;
        self.sender
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| self.unavailable())
    }

    fn unavailable(&self) -> Error {
        Error::OrchestratorUnavailable {
            name: self.name().to_string(),
            state: self.state.state().to_string(),
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

struct SerialWorker<W: ShardWriter> {
    state: StateHandle,
    writer: Arc<Mutex<W>>,
    io: Arc<dyn IoStrategy>,
    failure_handler: Arc<dyn FailureHandler>,
    max_batch_size: usize,
    uncommitted: bool,
    stale: bool,
    broken: bool,
    /// Content works applied since the last successful commit.
    pending: Vec<(WorkKind, String)>,
}

impl<W: ShardWriter> SerialWorker<W> {
    /// Returns whether the writer was left broken.
    async fn run(mut self, mut rx: mpsc::Receiver<Envelope<W>>) -> bool {
        let mut commit_timer = self.io.commit_interval().map(periodic);
        let mut refresh_timer = self.io.refresh_interval().map(periodic);

        loop {
            tokio::select! {
                envelope = rx.recv() => match envelope {
                    Some(envelope) => self.process_batch(envelope, &mut rx).await,
                    None => break,
                },
                _ = tick(&mut commit_timer) => self.background(true, false).await,
                _ = tick(&mut refresh_timer) => self.background(false, true).await,
            }
        }

        tracing::debug!(orchestrator = %self.state.name(), "work queue drained");
        self.resync();
        self.broken
    }

    async fn process_batch(&mut self, first: Envelope<W>, rx: &mut mpsc::Receiver<Envelope<W>>) {
        let mut batch = vec![first];
        while batch.len() < self.max_batch_size {
            match rx.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => break,
            }
        }

        self.resync();

        let writer = Arc::clone(&self.writer);
        let mut writer = writer.lock().await;
        let mut applied = Vec::with_capacity(batch.len());
        let mut commit = false;
        let mut refresh = false;

        tracing::debug!(orchestrator = %self.state.name(), batch = batch.len(), "applying batch");
        for Envelope { work, done } in batch {
            if self.broken {
                self.reject(work, done);
                continue;
            }
            let kind = work.kind();
            let description = work.describe();
            let visibility = work.visibility();

            match apply(&mut *writer, work).await {
                Ok(()) => {
                    if changes_content(kind) {
                        self.uncommitted = true;
                        self.stale = true;
                        self.pending.push((kind, description));
                    }
                    commit |= visibility.commit == DocumentCommitStrategy::Force;
                    refresh |= visibility.refresh == DocumentRefreshStrategy::Force;
                    applied.push(done);
                }
                Err(error) => {
                    let reason = error.is_fatal().then(|| error.to_string());
                    self.report(Some(kind), description, error);
                    if let Some(reason) = reason {
                        self.break_down(reason);
                    }
                    let _ = done.send(WorkOutcome::Failed);
                }
            }
        }

        if self.broken {
            for done in applied {
                let _ = done.send(WorkOutcome::Failed);
            }
            return;
        }

        let after = self.io.visibility_after_batch();
        let outcome = match self
            .make_visible(&mut *writer, commit || after.commit, refresh || after.refresh)
            .await
        {
            Ok(()) => WorkOutcome::Applied,
            Err(error) => {
                let reason = error.is_fatal().then(|| error.to_string());
                let action = format!("visibility actions after {} works", applied.len());
                self.report(None, self.with_pending(action), error);
                if let Some(reason) = reason {
                    self.break_down(reason);
                }
                WorkOutcome::Failed
            }
        };
        for done in applied {
            let _ = done.send(outcome);
        }
    }

    async fn background(&mut self, commit: bool, refresh: bool) {
        self.resync();
        if self.broken {
            return;
        }
        let writer = Arc::clone(&self.writer);
        let mut writer = writer.lock().await;
        if let Err(error) = self.make_visible(&mut *writer, commit, refresh).await {
            let reason = error.is_fatal().then(|| error.to_string());
            let action = if commit { "periodic commit" } else { "periodic refresh" };
            self.report(None, self.with_pending(action.to_string()), error);
            if let Some(reason) = reason {
                self.break_down(reason);
            }
        }
    }

    async fn make_visible(&mut self, writer: &mut W, commit: bool, refresh: bool) -> Result<()> {
        if commit && self.uncommitted {
            writer.commit().await?;
            self.uncommitted = false;
            self.pending.clear();
            tracing::trace!(orchestrator = %self.state.name(), "committed");
        }
        if refresh && self.stale {
            writer.refresh().await?;
            self.stale = false;
            tracing::trace!(orchestrator = %self.state.name(), "refreshed");
        }
        Ok(())
    }

    fn reject(&self, work: WorkFor<W>, done: oneshot::Sender<WorkOutcome>) {
        self.report(
            Some(work.kind()),
            work.describe(),
            Error::OrchestratorUnavailable {
                name: self.state.name().to_string(),
                state: self.state.state().to_string(),
            },
        );
        let _ = done.send(WorkOutcome::Failed);
    }

    fn break_down(&mut self, reason: String) {
        self.broken = true;
        tracing::error!(
            orchestrator = %self.state.name(),
            %reason,
            lost = self.pending.len(),
            "writer broken"
        );
        for (kind, work) in std::mem::take(&mut self.pending) {
            self.report(
                Some(kind),
                work,
                Error::backend_fatal(format!("uncommitted change lost: {reason}")),
            );
        }
        self.state
            .transition(&LifecycleState::Started, LifecycleState::Broken(reason));
    }

    /// Pick up a recovery: the reopened writer holds no uncommitted changes.
    fn resync(&mut self) {
        if self.broken && self.state.state() == LifecycleState::Started {
            self.broken = false;
            self.uncommitted = false;
            self.stale = false;
            self.pending.clear();
        }
    }

    fn with_pending(&self, action: String) -> String {
        if self.pending.is_empty() {
            return action;
        }
        let works: Vec<&str> = self.pending.iter().map(|(_, work)| work.as_str()).collect();
        format!("{action} (uncommitted: {})", works.join(", "))
    }

    fn report(&self, kind: Option<WorkKind>, work: String, error: Error) {
        self.failure_handler.handle(FailureContext {
            orchestrator: self.state.name().to_string(),
            kind,
            work,
            error,
        });
    }
}

async fn apply<W: ShardWriter>(writer: &mut W, work: WorkFor<W>) -> Result<()> {
    match work {
        IndexingWork::Add {
            target, document, ..
        } => writer.add(&target, document).await,
        IndexingWork::Update {
            target, document, ..
        } => writer.update(&target, document).await,
        IndexingWork::Delete { target, .. } => writer.delete(&target).await,
        IndexingWork::PurgeAll {
            tenant_id,
            routing_keys,
        } => writer.purge(tenant_id.as_deref(), &routing_keys).await,
        IndexingWork::DeleteByQuery { tenant_id, query } => {
            writer.delete_by_query(tenant_id.as_deref(), &query).await
        }
        IndexingWork::Flush | IndexingWork::Refresh => Ok(()),
        IndexingWork::Optimize => writer.merge_segments().await,
    }
}

fn changes_content(kind: WorkKind) -> bool {
    !matches!(
        kind,
        WorkKind::Flush | WorkKind::Refresh | WorkKind::Optimize
    )
}

fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
