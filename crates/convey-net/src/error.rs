//! Error types for the network module.

use thiserror::Error;

/// Errors that can occur during peer operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// Transport-level failure (connection, timeout, protocol).
    #[error("transport error: {0}")]
    Transport(String),

    /// A peer served bytes that did not decode.
    #[error("invalid peer data: {0}")]
    InvalidData(String),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
