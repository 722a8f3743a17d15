//! Bounded FIFO of ready tasks.
//!
//! Shared by the orchestrator (producer) and any number of workers
//! (consumers). Neither side ever blocks: a full queue fails the enqueue
//! with `QueueFull` and an empty one fails the claim with
//! `NoTaskAvailable`. Both are transient; callers retry with backoff.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::core::task::Task;
use crate::error::{Error, Result};

/// A bounded multi-producer multi-consumer task queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Append a task.
    ///
    /// On `QueueFull` the task is handed back so the caller can retry it.
    pub fn try_enqueue(&self, task: Task) -> std::result::Result<(), (Task, Error)> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => Err((
                task,
                Error::QueueFull {
                    capacity: self.capacity,
                },
            )),
        }
    }

    /// Take the oldest task.
    pub fn claim(&self) -> Result<Task> {
        match self.rx.try_recv() {
            Ok(task) => Ok(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                Err(Error::NoTaskAvailable)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
