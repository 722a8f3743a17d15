//! Worker pool for concurrent task execution.
//!
//! A `WorkerPool` runs a fixed number of workers. Each worker polls a
//! [`TaskSource`] for a task, simulates its cost, computes the result and
//! submits it back. Idle workers back off exponentially up to a cap.
//! Status changes can be observed through an optional event channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::task::{Task, TaskId, TaskResult};
use crate::error::{Error, Result};
use crate::util::{sleep_or_cancel, Backoff};
use crate::{alog, alog_debug, alog_trace, alog_warn};

use super::orchestrator::Orchestrator;

/// Where workers get tasks from and send results to.
///
/// Implemented in-process by [`Orchestrator`] and over HTTP by
/// [`crate::agent::HttpTaskClient`].
pub trait TaskSource: Send + Sync + 'static {
    /// Claim the next ready task, or `None` when nothing is queued.
    fn claim(&self) -> impl Future<Output = Result<Option<Task>>> + Send;

    fn submit(&self, result: TaskResult) -> impl Future<Output = Result<()>> + Send;
}

impl TaskSource for Orchestrator {
    async fn claim(&self) -> Result<Option<Task>> {
        Ok(self.claim_task().await)
    }

    async fn submit(&self, result: TaskResult) -> Result<()> {
        self.ingest_result(result).await
    }
}

/// Identifies a worker within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Events emitted by workers.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker took a task off the queue.
    Claimed { worker: WorkerId, task_id: TaskId },
    /// The result was accepted.
    Submitted { worker: WorkerId, task_id: TaskId },
    /// The result could not be delivered. The worker moves on.
    SubmitFailed {
        worker: WorkerId,
        task_id: TaskId,
        error: String,
    },
    /// The worker exited after cancellation.
    Stopped { worker: WorkerId },
}

/// A pool of workers sharing one task source.
pub struct WorkerPool<S: TaskSource> {
    source: Arc<S>,
    size: usize,
    poll_interval: Duration,
    max_backoff: Duration,
    event_tx: Option<mpsc::UnboundedSender<WorkerEvent>>,
}

impl<S: TaskSource> WorkerPool<S> {
    pub fn new(size: usize, source: Arc<S>, poll_interval: Duration, max_backoff: Duration) -> Self {
        Self {
            source,
            size,
            poll_interval,
            max_backoff,
            event_tx: None,
        }
    }

    /// Pool sized by `computing_power`, polling at the configured cadence.
    pub fn from_config(config: &Config, source: Arc<S>) -> Self {
        Self::new(
            config.computing_power,
            source,
            config.poll_interval(),
            config.max_backoff(),
        )
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Start every worker.
    pub fn spawn(self) -> PoolHandle {
        let cancel = CancellationToken::new();
        alog!("Starting {} worker(s)", self.size);

        let handles = (0..self.size)
            .map(|n| {
                let worker = Worker {
                    id: WorkerId(n),
                    source: Arc::clone(&self.source),
                    poll_interval: self.poll_interval,
                    max_backoff: self.max_backoff,
                    event_tx: self.event_tx.clone(),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        PoolHandle { cancel, handles }
    }
}

/// Handle to a running pool, used for graceful shutdown.
pub struct PoolHandle {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl PoolHandle {
    /// Signal every worker to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for joined in futures::future::join_all(self.handles).await {
            if let Err(e) = joined {
                alog_warn!("Worker task ended abnormally: {}", e);
            }
        }
    }

    pub async fn shutdown_and_join(self) {
        self.shutdown();
        self.join().await;
    }
}

struct Worker<S: TaskSource> {
    id: WorkerId,
    source: Arc<S>,
    poll_interval: Duration,
    max_backoff: Duration,
    event_tx: Option<mpsc::UnboundedSender<WorkerEvent>>,
    cancel: CancellationToken,
}

impl<S: TaskSource> Worker<S> {
    fn emit(&self, event: WorkerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    async fn run(self) {
        let mut backoff = Backoff::new(self.poll_interval, self.max_backoff);
        alog_debug!("{} started", self.id);

        loop {
            let claimed = tokio::select! {
                _ = self.cancel.cancelled() => break,
                claimed = self.source.claim() => claimed,
            };

            let task = match claimed {
                Ok(Some(task)) => {
                    backoff.reset();
                    task
                }
                Ok(None) => {
                    if !sleep_or_cancel(backoff.next_delay(), &self.cancel).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    alog_warn!("{} could not claim a task: {}", self.id, e);
                    if !sleep_or_cancel(backoff.next_delay(), &self.cancel).await {
                        break;
                    }
                    continue;
                }
            };

            let task_id = task.id;
            self.emit(WorkerEvent::Claimed {
                worker: self.id,
                task_id,
            });
            alog_trace!("{} executing {} {} {}", self.id, task.arg1, task.operation, task.arg2);

            // A task abandoned here is simply lost; its expression stays running.
            if !sleep_or_cancel(Duration::from_millis(task.operation_time), &self.cancel).await {
                break;
            }

            match self.source.submit(task.execute()).await {
                Ok(()) => self.emit(WorkerEvent::Submitted {
                    worker: self.id,
                    task_id,
                }),
                Err(Error::UnknownTask(_)) => {
                    alog_debug!("{}: result for {} was no longer wanted", self.id, task_id.short());
                    self.emit(WorkerEvent::Submitted {
                        worker: self.id,
                        task_id,
                    });
                }
                Err(e) => {
                    alog_warn!("{} failed to submit {}: {}", self.id, task_id.short(), e);
                    self.emit(WorkerEvent::SubmitFailed {
                        worker: self.id,
                        task_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        alog_debug!("{} stopped", self.id);
        self.emit(WorkerEvent::Stopped { worker: self.id });
    }
}
