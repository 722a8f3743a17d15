//! Dispatchable task and result wire types.
//!
//! A task is one ready operation node copied out of an expression's graph
//! with both operands resolved. Workers execute it and answer with a
//! [`TaskResult`] carrying either a value or a fault.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::token::Operator;
use crate::error::{Error, FailureKind, Result};

/// Unique identifier for a dispatched task.
///
/// Uses UUID v4 for generation and provides a short form display
/// for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A ready-to-execute binary operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    /// Simulated execution cost in milliseconds.
    pub operation_time: u64,
}

impl Task {
    pub fn new(operation: Operator, arg1: f64, arg2: f64, operation_time: u64) -> Self {
        Self {
            id: TaskId::new(),
            arg1,
            arg2,
            operation,
            operation_time,
        }
    }

    /// Compute the task's outcome.
    ///
    /// Never fails: division by zero and overflow become [`TaskFault`]
    /// results.
    pub fn execute(&self) -> TaskResult {
        match self.operation.apply(self.arg1, self.arg2) {
            Ok(value) => TaskResult::value(self.id, value),
            Err(Error::Overflow) => TaskResult::fault(self.id, TaskFault::Overflow),
            Err(_) => TaskResult::fault(self.id, TaskFault::DivisionByZero),
        }
    }
}

/// An error a worker reports in place of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFault {
    DivisionByZero,
    Overflow,
}

impl std::fmt::Display for TaskFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFault::DivisionByZero => write!(f, "division by zero"),
            TaskFault::Overflow => write!(f, "result out of range"),
        }
    }
}

impl From<TaskFault> for FailureKind {
    fn from(fault: TaskFault) -> Self {
        match fault {
            TaskFault::DivisionByZero => FailureKind::DivisionByZero,
            TaskFault::Overflow => FailureKind::Overflow,
        }
    }
}

/// The validated content of a [`TaskResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome {
    Value(f64),
    Fault(TaskFault),
}

/// A worker's answer for one task.
///
/// Exactly one of `value` and `error` must be present. `result` is
/// accepted as an alias of `value` for older agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    #[serde(default, alias = "result", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFault>,
}

impl TaskResult {
    pub fn value(task_id: TaskId, value: f64) -> Self {
        Self {
            task_id,
            value: Some(value),
            error: None,
        }
    }

    pub fn fault(task_id: TaskId, fault: TaskFault) -> Self {
        Self {
            task_id,
            value: None,
            error: Some(fault),
        }
    }

    pub fn outcome(&self) -> Result<TaskOutcome> {
        match (self.value, self.error) {
            (Some(value), None) if value.is_finite() => Ok(TaskOutcome::Value(value)),
            (Some(value), None) => Err(Error::MalformedResult(format!(
                "non-finite value {} for task {}",
                value, self.task_id
            ))),
            (None, Some(fault)) => Ok(TaskOutcome::Fault(fault)),
            (Some(_), Some(_)) => Err(Error::MalformedResult(format!(
                "task {} carries both a value and an error",
                self.task_id
            ))),
            (None, None) => Err(Error::MalformedResult(format!(
                "task {} carries neither a value nor an error",
                self.task_id
            ))),
        }
    }
}
