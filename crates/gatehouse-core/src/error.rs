//! Error types for the lockout core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by policy construction and record parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Policy parameters are unusable
    #[error("Invalid lockout policy: {0}")]
    InvalidPolicy(String),

    /// A persisted value could not be parsed
    #[error("Corrupt lockout record: {key} = {value:?}")]
    CorruptRecord {
        /// Storage key holding the bad value
        key: String,
        /// Raw value as read from storage
        value: String,
    },
}
