//! Error types for the Convey core.

use thiserror::Error;

/// Core errors that can occur during record and block operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    /// The caller is not in the record's access list, supplied the wrong
    /// key, or the ciphertext failed authentication. Deliberately opaque.
    #[error("Access denied")]
    AccessDenied,

    #[error("Unrecognized media type: {0}")]
    UnrecognizedMediaType(String),
}

/// Validation errors for record structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("record creator is empty")]
    MissingCreator,

    #[error("access entry for {0} is malformed")]
    MalformedAccess(String),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            other => ValidationError::StructuralError(other.to_string()),
        }
    }
}
