//! # AppError
//!
//! Centralized error handling for the bike-exchange client.
//! Maps lifecycle, validation and backend failures to actionable error types.

use thiserror::Error;

use crate::status::Status;

/// The primary error type for all bx-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Payload is missing required fields (caught before any network call)
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested status change is not an edge of the lifecycle graph
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    /// Backend unreachable (connect failure, timeout, broken body)
    #[error("network error: {0}")]
    Network(String),

    /// Resource not found (e.g., Posting)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Backend answered with a non-success response
    #[error("backend rejected the request: {message}")]
    BackendRejection { status: Option<u16>, message: String },

    /// Missing session or wrong role for the requested action
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., cache directory not writable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn posting_not_found(id: impl Into<String>) -> Self {
        AppError::NotFound("Posting".to_string(), id.into())
    }

    /// Message suitable for showing to the user verbatim.
    pub fn user_message(&self) -> String {
        match self {
            AppError::BackendRejection { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization failed: {err}"))
    }
}

/// A specialized Result type for bike-exchange logic.
pub type Result<T> = std::result::Result<T, AppError>;
