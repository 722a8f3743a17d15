//! Orchestration layer: expression lifecycle, the ready-task queue and
//! the worker pool that drains it.
//!
//! The [`Orchestrator`] owns every expression's state and is the only
//! component that creates tasks. Workers, whether in-process through a
//! [`WorkerPool`] or remote agents over HTTP, only ever see individual
//! [`crate::core::Task`]s.

mod expression;
mod orchestrator;
mod pool;
mod queue;
mod registry;

pub use expression::{Expression, ExpressionId, ExpressionStatus};
pub use orchestrator::Orchestrator;
pub use pool::{PoolHandle, TaskSource, WorkerEvent, WorkerId, WorkerPool};
pub use queue::TaskQueue;
pub use registry::{ExpressionRegistry, Ingestion};
