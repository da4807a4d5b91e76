// src/common/error.rs

use thiserror::Error;
use uuid::Uuid;

// Single error type shared by repositories, services and the workflow adapters.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("points are disabled for account {0}")]
    RestrictedAccount(Uuid),

    #[error("external workflow system unavailable: {0}")]
    AdapterFailure(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        AppError::AdapterFailure(message.into())
    }

    /// Whether the caller can re-fetch and try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::AdapterFailure(_) | AppError::Conflict(_))
    }
}
