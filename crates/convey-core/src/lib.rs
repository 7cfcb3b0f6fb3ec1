//! # Convey Core
//!
//! Pure data model for the Convey network: records, blocks, payloads,
//! and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Record`] - The immutable signed unit of content
//! - [`Block`] - A proof-of-work-sealed, ordered set of records
//! - [`RecordHash`] / [`BlockHash`] - Content addresses (Blake3)
//! - [`Message`], [`Conversation`], [`Transaction`] - Payload types
//!
//! ## Canonicalization
//!
//! Records and blocks are encoded using deterministic CBOR; the content
//! address and the record cost are both taken over that encoding. See
//! [`canonical`].

pub mod access;
pub mod block;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod payload;
pub mod record;
pub mod types;
pub mod validation;

pub use block::{leading_zero_bits, Block, BlockEntry};
pub use canonical::{
    canonical_block_bytes, canonical_record_bytes, decode_block, decode_record, record_preimage,
};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, X25519PublicKey};
pub use error::{CoreError, ValidationError};
pub use payload::{
    AliasRegistration, ChannelHead, Conversation, MediaType, Message, Registration, Transaction,
};
pub use record::{Record, RecordAccess, COST_BYTES_PER_TOKEN};
pub use types::{BlockHash, RecordHash};
pub use validation::{validate_record, validate_record_structure};
