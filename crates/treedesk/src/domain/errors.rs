//! Domain-specific errors.

use thiserror::Error;

use crate::domain::model::NodeKind;

/// Failures of structural tree operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("no node at '{0}'")]
    NotFound(String),
    #[error("parent '{0}' does not exist")]
    ParentNotFound(String),
    #[error("a sibling named '{0}' already exists")]
    Conflict(String),
    #[error("invalid node name '{0}'")]
    InvalidName(String),
    #[error("malformed snapshot: {0}")]
    MalformedImport(String),
    #[error("'{path}' is a {kind} node and cannot hold this payload")]
    WrongType { path: String, kind: NodeKind },
    #[error("'{path}' would nest deeper than {limit} levels")]
    TooDeep { path: String, limit: usize },
}

/// Failures reported by a capability provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("failed to load {tool}: {reason}")]
    Load { tool: &'static str, reason: String },
    #[error("{0} is not available after loading")]
    Missing(&'static str),
    #[error("{0}")]
    Rejected(String),
}

/// Failures of editing-session operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no node at '{0}'")]
    NotFound(String),
    #[error("'{path}' is a {kind} node and cannot be edited this way")]
    WrongType { path: String, kind: NodeKind },
    #[error("editing tool unavailable: {0}")]
    ToolUnavailable(String),
    #[error("editing tool failed to save: {0}")]
    ToolSaveError(String),
    #[error("no editing session is open")]
    NoActiveSession,
    #[error("malformed diagram: {0}")]
    MalformedImport(String),
}

impl From<TreeError> for SessionError {
    fn from(value: TreeError) -> Self {
        match value {
            TreeError::NotFound(path) | TreeError::ParentNotFound(path) => {
                SessionError::NotFound(path)
            }
            TreeError::MalformedImport(reason) => SessionError::MalformedImport(reason),
            TreeError::WrongType { path, kind } => SessionError::WrongType { path, kind },
            other => SessionError::ToolSaveError(other.to_string()),
        }
    }
}
