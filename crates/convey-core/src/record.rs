//! Record: the immutable signed unit of content.
//!
//! A record is created once, signed by its author, and never edited.
//! Its identity is the Blake3 hash of its canonical encoding, and its
//! economic weight is derived from the size of that encoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::access;
use crate::canonical::{canonical_record_bytes, record_preimage};
use crate::crypto::{Ed25519Signature, Keypair, X25519PublicKey};
use crate::error::CoreError;
use crate::types::RecordHash;

/// Bytes of canonical encoding covered by one token.
pub const COST_BYTES_PER_TOKEN: u64 = 100;

/// The wrapped content key for a single recipient.
///
/// The record payload is sealed under a fresh content key; each recipient
/// gets the content key wrapped via X25519 agreement with an ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAccess {
    /// The recipient's alias.
    pub alias: String,

    /// Ephemeral X25519 public key used for this wrap.
    pub ephemeral_key: X25519PublicKey,

    /// Nonce for the key wrap.
    pub nonce: [u8; 12],

    /// The content key, encrypted for the recipient.
    pub wrapped_key: Vec<u8>,
}

/// An immutable signed record.
///
/// With an empty access list the payload is plaintext. Otherwise the
/// payload is a sealed envelope only the listed recipients can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Author-claimed creation time (Unix seconds). Untrusted.
    pub timestamp: u64,

    /// The author's alias.
    pub creator: String,

    /// Per-recipient wrapped keys. Empty for public records.
    pub access: Vec<RecordAccess>,

    /// The payload bytes (plaintext or sealed).
    pub payload: Bytes,

    /// Ed25519 signature over the canonical preimage.
    pub signature: Ed25519Signature,
}

impl Record {
    /// Create and sign a public record.
    pub fn sign(
        timestamp: u64,
        creator: &str,
        payload: impl Into<Bytes>,
        keypair: &Keypair,
    ) -> Self {
        Self::assemble(timestamp, creator, Vec::new(), payload.into(), keypair)
    }

    /// Create and sign a record whose payload is sealed for the given
    /// recipients.
    pub fn sign_sealed(
        timestamp: u64,
        creator: &str,
        plaintext: &[u8],
        recipients: &[(String, X25519PublicKey)],
        keypair: &Keypair,
    ) -> Result<Self, CoreError> {
        let (payload, access) = access::seal_payload(plaintext, recipients)?;
        Ok(Self::assemble(timestamp, creator, access, payload, keypair))
    }

    fn assemble(
        timestamp: u64,
        creator: &str,
        access: Vec<RecordAccess>,
        payload: Bytes,
        keypair: &Keypair,
    ) -> Self {
        let mut record = Record {
            timestamp,
            creator: creator.to_string(),
            access,
            payload,
            signature: Ed25519Signature::ZERO,
        };
        record.signature = keypair.sign(&record_preimage(&record));
        record
    }

    /// Compute the record's content address.
    pub fn hash(&self) -> RecordHash {
        RecordHash(*blake3::hash(&canonical_record_bytes(self)).as_bytes())
    }

    /// The record's cost in tokens: 1 token per 100 bytes of canonical
    /// encoding, rounded up. Derived, never stored.
    pub fn cost(&self) -> u64 {
        let size = canonical_record_bytes(self).len() as u64;
        size.div_ceil(COST_BYTES_PER_TOKEN)
    }

    /// Whether the payload is sealed.
    pub fn is_sealed(&self) -> bool {
        !self.access.is_empty()
    }

    /// Recover the plaintext payload.
    ///
    /// Public records return the payload as-is. Sealed records require
    /// the caller's alias to be in the access list and the matching
    /// agreement key; anything else is the opaque access-denied error.
    pub fn unwrap_payload(&self, alias: &str, keypair: &Keypair) -> Result<Bytes, CoreError> {
        if self.access.is_empty() {
            return Ok(self.payload.clone());
        }

        let entry = self
            .access
            .iter()
            .find(|a| a.alias == alias)
            .ok_or(CoreError::AccessDenied)?;

        access::open_payload(&self.payload, entry, keypair).map(Bytes::from)
    }
}
