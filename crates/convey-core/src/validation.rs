//! Record validation: signature verification and structural checks.
//!
//! Aliases are bound to public keys out of core (on the alias chain), so
//! the caller resolves the creator's key before verifying.

use crate::canonical::record_preimage;
use crate::crypto::Ed25519PublicKey;
use crate::error::ValidationError;
use crate::record::Record;

/// Validate a record against its creator's resolved public key.
pub fn validate_record(
    record: &Record,
    creator_key: &Ed25519PublicKey,
) -> Result<(), ValidationError> {
    validate_record_structure(record)?;

    let preimage = record_preimage(record);
    creator_key
        .verify(&preimage, &record.signature)
        .map_err(|_| ValidationError::SignatureFailed)
}

/// Structural checks that need no key material.
pub fn validate_record_structure(record: &Record) -> Result<(), ValidationError> {
    if record.creator.is_empty() {
        return Err(ValidationError::MissingCreator);
    }

    for entry in &record.access {
        if entry.alias.is_empty() || entry.wrapped_key.is_empty() {
            return Err(ValidationError::MalformedAccess(entry.alias.clone()));
        }
    }

    Ok(())
}
