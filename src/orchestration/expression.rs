//! Expression records and their status state machine.
//!
//! ```text
//! pending -> running -> completed
//!    |          |
//!    +----------+-----> failed
//! ```
//!
//! `completed` and `failed` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, FailureKind, Result};

/// Unique identifier for a submitted expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub Uuid);

impl ExpressionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ExpressionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExpressionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    /// Accepted, decomposition not started.
    Pending,
    /// Decomposed; tasks are in flight.
    Running,
    Completed,
    Failed,
}

impl ExpressionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpressionStatus::Completed | ExpressionStatus::Failed)
    }

    pub fn can_transition(&self, target: ExpressionStatus) -> bool {
        matches!(
            (self, target),
            (ExpressionStatus::Pending, ExpressionStatus::Running)
                | (ExpressionStatus::Pending, ExpressionStatus::Failed)
                | (ExpressionStatus::Running, ExpressionStatus::Completed)
                | (ExpressionStatus::Running, ExpressionStatus::Failed)
        )
    }
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionStatus::Pending => write!(f, "pending"),
            ExpressionStatus::Running => write!(f, "running"),
            ExpressionStatus::Completed => write!(f, "completed"),
            ExpressionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A submitted expression as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    /// The submitted text.
    pub expression: String,
    pub status: ExpressionStatus,
    /// Final value; only set once `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    /// Why the expression failed; only set once `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Expression {
    pub fn new(text: &str) -> Self {
        Self {
            id: ExpressionId::new(),
            expression: text.to_string(),
            status: ExpressionStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn transition(&mut self, target: ExpressionStatus) -> Result<()> {
        if !self.status.can_transition(target) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        if target.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Decomposition has begun.
    pub fn start(&mut self) -> Result<()> {
        self.transition(ExpressionStatus::Running)
    }

    pub fn complete(&mut self, value: f64) -> Result<()> {
        self.transition(ExpressionStatus::Completed)?;
        self.result = Some(value);
        Ok(())
    }

    pub fn fail(&mut self, kind: FailureKind) -> Result<()> {
        self.transition(ExpressionStatus::Failed)?;
        self.error = Some(kind);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
