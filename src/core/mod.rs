//! Core domain models for distributed expression evaluation.
//!
//! This module contains the parser, the operation-node DAG an expression
//! decomposes into, and the task/result types exchanged with workers.

pub mod calc;
pub mod dag;
pub mod task;
pub mod token;

pub use dag::{ExpressionDag, NodeId, NodeState, Operand, OperationNode};
pub use task::{Task, TaskFault, TaskId, TaskOutcome, TaskResult};
pub use token::{Operator, RpnItem, Token};
