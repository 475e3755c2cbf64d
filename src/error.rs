//! Errors surfaced by storm operations.

use crate::types::StormStatus;

pub type StormResult<T> = Result<T, StormError>;

/// Every storm operation either succeeds or fails with exactly one of these.
/// None of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StormError {
    #[error("Storm is in {actual} phase, expected {expected}")]
    InvalidPhase {
        expected: StormStatus,
        actual: StormStatus,
    },

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Insufficient {color} tokens: {requested} requested, {remaining} remaining")]
    BudgetExceeded {
        color: TokenColor,
        requested: u32,
        remaining: u32,
    },

    #[error("Cannot advance from results phase")]
    TerminalPhase,

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl StormError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StormError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Short machine-readable code, used in API error bodies and logs
    pub fn code(&self) -> &'static str {
        match self {
            StormError::InvalidPhase { .. } => "INVALID_PHASE",
            StormError::Forbidden(_) => "FORBIDDEN",
            StormError::ValidationError(_) => "VALIDATION_ERROR",
            StormError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            StormError::TerminalPhase => "TERMINAL_PHASE",
            StormError::NotFound { .. } => "NOT_FOUND",
            StormError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<std::io::Error> for StormError {
    fn from(e: std::io::Error) -> Self {
        StormError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for StormError {
    fn from(e: serde_json::Error) -> Self {
        StormError::Storage(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenColor {
    Blue,
    Red,
}

impl std::fmt::Display for TokenColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenColor::Blue => f.write_str("blue"),
            TokenColor::Red => f.write_str("red"),
        }
    }
}
