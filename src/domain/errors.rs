//! Business-level error types
//!
//! These errors are framework-agnostic. The HTTP layer maps them onto status
//! codes; `Storage` details are logged but never shown to clients verbatim.

use std::fmt;

#[derive(Debug)]
pub enum ServiceError {
    /// Bad input shape or value; always recoverable, no side effects
    Validation(String),
    /// Missing entity by id
    NotFound,
    /// Duplicate invoice number, duplicate product name, duplicate username
    Conflict(String),
    /// Caller lacks the required role
    Forbidden,
    /// Transaction/commit failure in the storage layer
    Storage(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ServiceError::NotFound => write!(f, "Resource not found"),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ServiceError::Forbidden => write!(f, "Admin role required"),
            ServiceError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

/// SQLite reports unique-index violations only through the error text.
pub fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("1555") || msg.contains("2067")
}
