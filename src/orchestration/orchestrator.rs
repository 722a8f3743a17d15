//! Orchestrator: accepts expressions, drives decomposition and dispatch,
//! and folds worker results back into expression state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{Config, OperationTimes};
use crate::core::dag::ExpressionDag;
use crate::core::task::{Task, TaskResult};
use crate::error::{Error, FailureKind, Result};
use crate::util::{sleep_or_cancel, Backoff};
use crate::{alog, alog_debug, alog_error, alog_trace, alog_warn};

use super::expression::{Expression, ExpressionId, ExpressionStatus};
use super::queue::TaskQueue;
use super::registry::ExpressionRegistry;

/// Ready tasks that did not fit in the queue, oldest first.
///
/// While it is non-empty every newly ready task joins the back of it, so
/// tasks reach the queue in the order they became ready. At most one
/// drainer runs at a time.
#[derive(Default)]
struct Backlog {
    tasks: VecDeque<Task>,
    draining: bool,
}

/// Shared orchestrator state.
///
/// Cloning is cheap; every clone drives the same registry, queue and
/// backlog. Background work (decomposition, backlog draining) runs on a
/// shared [`TaskTracker`] so [`Orchestrator::shutdown`] can wait for it.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<RwLock<ExpressionRegistry>>,
    queue: TaskQueue,
    backlog: Arc<Mutex<Backlog>>,
    retry_interval: Duration,
    max_backoff: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Self::with_queue(
            config.operation_times,
            TaskQueue::new(config.queue_capacity),
            config.poll_interval(),
            config.max_backoff(),
        )
    }

    pub fn with_queue(
        timings: OperationTimes,
        queue: TaskQueue,
        retry_interval: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(ExpressionRegistry::new(timings))),
            queue,
            backlog: Arc::new(Mutex::new(Backlog::default())),
            retry_interval,
            max_backoff,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Token cancelled by [`Orchestrator::shutdown`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept an expression and start evaluating it in the background.
    ///
    /// Empty or whitespace-only text is rejected here and never recorded.
    /// Everything else gets an id immediately; parse errors surface later
    /// as a `failed` status.
    pub async fn submit(&self, text: &str) -> Result<ExpressionId> {
        if text.trim().is_empty() {
            return Err(Error::EmptyExpression);
        }

        let id = self.registry.write().await.insert(text);
        alog!("Expression {} submitted: {}", id.short(), text);

        let this = self.clone();
        let text = text.to_string();
        self.tracker.spawn(async move {
            this.decompose(id, &text).await;
        });

        Ok(id)
    }

    async fn decompose(&self, id: ExpressionId, text: &str) {
        if let Err(e) = self.registry.write().await.start(&id) {
            alog_error!("Expression {} could not start: {}", id.short(), e);
            return;
        }

        let planned = match ExpressionDag::parse(text) {
            Ok(dag) => {
                alog_debug!(
                    "Expression {} decomposed into {} operation(s)",
                    id.short(),
                    dag.node_count()
                );
                self.registry.write().await.attach(&id, dag)
            }
            Err(e) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::InvalidExpression);
                alog_warn!("Expression {} failed to parse: {}", id.short(), e);
                self.registry
                    .write()
                    .await
                    .fail(&id, kind)
                    .map(|_| Vec::new())
            }
        };

        match planned {
            Ok(tasks) => self.dispatch(tasks).await,
            Err(e) => alog_error!("Expression {} could not be planned: {}", id.short(), e),
        }
    }

    /// Enqueue tasks in order behind anything already backlogged.
    ///
    /// Tasks that do not fit go to the backlog, which a background drainer
    /// feeds into the queue as space frees up. The caller never blocks on
    /// a full queue.
    async fn dispatch(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }

        let mut backlog = self.backlog.lock().await;
        let mut pending = tasks.into_iter();
        if backlog.tasks.is_empty() {
            while let Some(task) = pending.next() {
                let task_id = task.id;
                if let Err((task, e)) = self.queue.try_enqueue(task) {
                    alog_warn!("{}; backlogging {} task(s)", e, pending.len() + 1);
                    backlog.tasks.push_back(task);
                    break;
                }
                alog_trace!("Task {} enqueued", task_id.short());
            }
        }
        backlog.tasks.extend(pending);

        if !backlog.tasks.is_empty() && !backlog.draining {
            backlog.draining = true;
            let this = self.clone();
            self.tracker.spawn(async move {
                this.drain_backlog().await;
            });
        }
    }

    async fn drain_backlog(&self) {
        let mut backoff = Backoff::new(self.retry_interval, self.max_backoff);

        loop {
            let waiting = {
                let mut backlog = self.backlog.lock().await;
                while let Some(task) = backlog.tasks.pop_front() {
                    // The owning expression may have failed while we waited.
                    if !self.registry.read().await.is_outstanding(&task.id) {
                        continue;
                    }
                    if let Err((task, _)) = self.queue.try_enqueue(task) {
                        backlog.tasks.push_front(task);
                        break;
                    }
                    backoff.reset();
                }
                if backlog.tasks.is_empty() {
                    backlog.draining = false;
                    return;
                }
                backlog.tasks.len()
            };

            if !sleep_or_cancel(backoff.next_delay(), &self.cancel).await {
                alog_debug!("Backlog drain cancelled with {} task(s)", waiting);
                return;
            }
        }
    }

    /// Number of ready tasks waiting for queue space.
    pub async fn backlog_len(&self) -> usize {
        self.backlog.lock().await.tasks.len()
    }

    /// Hand the oldest ready task to a worker.
    ///
    /// Tasks whose expression has already failed are dropped on the way.
    pub async fn claim_task(&self) -> Option<Task> {
        loop {
            let task = self.queue.claim().ok()?;
            if self.registry.read().await.is_outstanding(&task.id) {
                alog_trace!("Task {} claimed", task.id.short());
                return Some(task);
            }
            alog_debug!("Dropping stale task {}", task.id.short());
        }
    }

    /// Record a worker's result and dispatch whatever it unblocked.
    pub async fn ingest_result(&self, result: TaskResult) -> Result<()> {
        let ingestion = self.registry.write().await.ingest(&result)?;

        match ingestion.status {
            ExpressionStatus::Completed => {
                alog!("Expression {} completed", ingestion.expression_id.short())
            }
            ExpressionStatus::Failed => {
                alog_warn!("Expression {} failed", ingestion.expression_id.short())
            }
            _ => alog_trace!(
                "Task {} resolved, {} task(s) unblocked",
                result.task_id.short(),
                ingestion.tasks.len()
            ),
        }

        self.dispatch(ingestion.tasks).await;
        Ok(())
    }

    /// All expressions in submission order.
    pub async fn expressions(&self) -> Vec<Expression> {
        self.registry.read().await.list()
    }

    pub async fn expression(&self, id: &ExpressionId) -> Result<Expression> {
        self.registry
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ExpressionNotFound(id.to_string()))
    }

    pub async fn tasks_issued(&self, id: &ExpressionId) -> Option<usize> {
        self.registry.read().await.tasks_issued(id)
    }

    /// Stop backlog draining and wait for in-flight decomposition.
    pub async fn shutdown(&self) {
        alog_debug!("Orchestrator shutting down");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
