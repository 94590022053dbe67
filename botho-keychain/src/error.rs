//! Error types for the keychain.
//!
//! Nothing here is ever sent across the page boundary: page-facing failures
//! are absorbed by the dispatcher, and privileged-side failures are turned
//! into response payloads by the service.

use displaydoc::Display;
use thiserror::Error;

/// Errors that can occur in the keychain.
#[derive(Debug, Display, Error)]
pub enum KeychainError {
    /// Key role {role} is not allowed for {kind} requests
    InvalidRole {
        /// Request kind that rejected the role
        kind: &'static str,
        /// Rejected role
        role: String,
    },

    /// Invalid amount {amount}: {reason}
    InvalidAmount {
        /// Amount as supplied by the caller
        amount: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Weight {0} is outside the accepted range
    InvalidWeight(i64),

    /// Missing required field: {0}
    MissingField(&'static str),

    /// Invalid endpoint: {0}
    InvalidEndpoint(String),

    /// Storage error: {0}
    Storage(String),

    /// Serialization error: {0}
    Serialization(#[from] serde_json::Error),

    /// Discovery service unavailable: {0}
    Discovery(String),

    /// Network error: {0}
    Network(String),

    /// Boundary channel closed
    ChannelClosed,

    /// Timed out waiting for a response
    Timeout,

    /// Keychain is locked
    Locked,

    /// Configuration error: {0}
    Config(String),
}

impl From<std::io::Error> for KeychainError {
    fn from(err: std::io::Error) -> Self {
        KeychainError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for KeychainError {
    fn from(err: reqwest::Error) -> Self {
        KeychainError::Network(err.to_string())
    }
}

/// Result type for keychain operations.
pub type KeychainResult<T> = Result<T, KeychainError>;
