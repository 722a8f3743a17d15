use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::task::TaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty expression or invalid request")]
    EmptyExpression,

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result out of range")]
    Overflow,

    #[error("Expression not found: {0}")]
    ExpressionNotFound(String),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Malformed result: {0}")]
    MalformedResult(String),

    #[error("Task queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    #[error("No task available")]
    NoTaskAvailable,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No home directory")]
    NoHomeDir,
}

impl Error {
    /// The terminal failure this error represents for an expression, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::EmptyExpression => Some(FailureKind::EmptyExpression),
            Error::InvalidExpression(_) => Some(FailureKind::InvalidExpression),
            Error::DivisionByZero => Some(FailureKind::DivisionByZero),
            Error::Overflow => Some(FailureKind::Overflow),
            _ => None,
        }
    }
}

/// Why an expression ended up `failed`.
///
/// Stored on the expression record and reported to clients, so unlike
/// [`Error`] it is cheap to clone and serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyExpression,
    InvalidExpression,
    DivisionByZero,
    Overflow,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::EmptyExpression => write!(f, "empty expression or invalid request"),
            FailureKind::InvalidExpression => write!(f, "invalid expression"),
            FailureKind::DivisionByZero => write!(f, "division by zero"),
            FailureKind::Overflow => write!(f, "result out of range"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
