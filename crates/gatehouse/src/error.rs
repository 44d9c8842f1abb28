//! Error types for the login gate

use thiserror::Error;

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that can occur around the gate
///
/// Provider outcomes are never reported here; they become a
/// [`GateResult`](crate::GateResult).
#[derive(Debug, Error)]
pub enum GateError {
    /// Lockout core error
    #[error("Lockout error: {0}")]
    Core(#[from] gatehouse_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted lockout state could not be read or written
    #[error("Store error: {0}")]
    Store(String),

    /// Identity was empty
    #[error("Identity must not be empty")]
    EmptyIdentity,

    /// Credential was empty
    #[error("Credential must not be empty")]
    EmptyCredential,
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Serialization(e.to_string())
    }
}
