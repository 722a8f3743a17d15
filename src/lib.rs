//! Abacus: a distributed arithmetic expression evaluator.
//!
//! Expressions submitted to the orchestrator are parsed into a graph of
//! binary operations. Every operation whose operands are known becomes a
//! task on a bounded queue; workers (in-process or remote agents) claim
//! tasks, compute them and report back, which unblocks dependent
//! operations until the root value is known.

pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod server;
pub mod util;

pub use error::{Error, FailureKind, Result};
