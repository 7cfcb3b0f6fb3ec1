//! Canonical CBOR encoding for deterministic serialization.
//!
//! Implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use the smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Records and blocks are encoded as maps with small integer keys, which
//! CBOR packs into single bytes. The encoding is critical: the same record
//! must produce identical bytes (and thus an identical hash) on every
//! platform, or peers will disagree about content addresses.

use bytes::Bytes;
use ciborium::value::Value;

use crate::block::{Block, BlockEntry};
use crate::crypto::{Ed25519Signature, X25519PublicKey};
use crate::error::CoreError;
use crate::record::{Record, RecordAccess};
use crate::types::{BlockHash, RecordHash};

/// Record field keys. Keys 0-23 encode as single bytes in CBOR.
mod record_keys {
    pub const TIMESTAMP: u64 = 0;
    pub const CREATOR: u64 = 1;
    pub const ACCESS: u64 = 2;
    pub const PAYLOAD: u64 = 3;
    pub const SIGNATURE: u64 = 4;
}

/// Record access-entry field keys.
mod access_keys {
    pub const ALIAS: u64 = 0;
    pub const EPHEMERAL_KEY: u64 = 1;
    pub const NONCE: u64 = 2;
    pub const WRAPPED_KEY: u64 = 3;
}

/// Block field keys.
mod block_keys {
    pub const CHANNEL: u64 = 0;
    pub const TIMESTAMP: u64 = 1;
    pub const MINER: u64 = 2;
    pub const PRIOR_HASH: u64 = 3;
    pub const ENTRIES: u64 = 4;
    pub const NONCE: u64 = 5;
}

/// Block entry field keys.
mod entry_keys {
    pub const RECORD_HASH: u64 = 0;
    pub const RECORD: u64 = 1;
}

// ─────────────────────────────────────────────────────────────────────────
// Public encode entry points
// ─────────────────────────────────────────────────────────────────────────

/// Encode a record to canonical bytes. This is what gets hashed and stored.
pub fn canonical_record_bytes(record: &Record) -> Vec<u8> {
    encode_canonical(&record_to_value(record, true))
}

/// Encode the signed preimage of a record: every field but the signature.
pub fn record_preimage(record: &Record) -> Vec<u8> {
    encode_canonical(&record_to_value(record, false))
}

/// Encode a block to canonical bytes. This is what gets hashed for PoW.
pub fn canonical_block_bytes(block: &Block) -> Vec<u8> {
    encode_canonical(&block_to_value(block))
}

/// Encode an arbitrary CBOR value canonically.
///
/// Used by the payload codecs, which share the record encoding discipline.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Parse bytes into a CBOR value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────
// Record conversion
// ─────────────────────────────────────────────────────────────────────────

fn record_to_value(record: &Record, with_signature: bool) -> Value {
    let access: Vec<Value> = record.access.iter().map(access_to_value).collect();

    let mut entries = vec![
        (
            Value::Integer(record_keys::TIMESTAMP.into()),
            Value::Integer(record.timestamp.into()),
        ),
        (
            Value::Integer(record_keys::CREATOR.into()),
            Value::Text(record.creator.clone()),
        ),
        (
            Value::Integer(record_keys::ACCESS.into()),
            Value::Array(access),
        ),
        (
            Value::Integer(record_keys::PAYLOAD.into()),
            Value::Bytes(record.payload.to_vec()),
        ),
    ];

    if with_signature {
        entries.push((
            Value::Integer(record_keys::SIGNATURE.into()),
            Value::Bytes(record.signature.0.to_vec()),
        ));
    }

    Value::Map(entries)
}

fn access_to_value(access: &RecordAccess) -> Value {
    Value::Map(vec![
        (
            Value::Integer(access_keys::ALIAS.into()),
            Value::Text(access.alias.clone()),
        ),
        (
            Value::Integer(access_keys::EPHEMERAL_KEY.into()),
            Value::Bytes(access.ephemeral_key.0.to_vec()),
        ),
        (
            Value::Integer(access_keys::NONCE.into()),
            Value::Bytes(access.nonce.to_vec()),
        ),
        (
            Value::Integer(access_keys::WRAPPED_KEY.into()),
            Value::Bytes(access.wrapped_key.clone()),
        ),
    ])
}

/// Decode a record from canonical bytes.
pub fn decode_record(bytes: &[u8]) -> Result<Record, CoreError> {
    let value = decode_value(bytes)?;
    record_from_value(&value)
}

/// Convert a CBOR value back into a record.
pub fn record_from_value(value: &Value) -> Result<Record, CoreError> {
    let map = as_map(value, "record")?;

    let timestamp = require_u64(map, record_keys::TIMESTAMP, "record timestamp")?;
    let creator = require_text(map, record_keys::CREATOR, "record creator")?;
    let payload = require_bytes(map, record_keys::PAYLOAD, "record payload")?;
    let signature: [u8; 64] = require_bytes(map, record_keys::SIGNATURE, "record signature")?
        .try_into()
        .map_err(|_| CoreError::MalformedRecord("signature must be 64 bytes".into()))?;

    let access = match map_get(map, record_keys::ACCESS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(access_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
        _ => return Err(CoreError::MalformedRecord("invalid access list".into())),
    };

    Ok(Record {
        timestamp,
        creator,
        access,
        payload: Bytes::from(payload),
        signature: Ed25519Signature(signature),
    })
}

fn access_from_value(value: &Value) -> Result<RecordAccess, CoreError> {
    let map = as_map(value, "access entry")?;

    let alias = require_text(map, access_keys::ALIAS, "access alias")?;
    let ephemeral_key = require_bytes32(map, access_keys::EPHEMERAL_KEY, "access ephemeral key")?;
    let nonce: [u8; 12] = require_bytes(map, access_keys::NONCE, "access nonce")?
        .try_into()
        .map_err(|_| CoreError::MalformedRecord("access nonce must be 12 bytes".into()))?;
    let wrapped_key = require_bytes(map, access_keys::WRAPPED_KEY, "access wrapped key")?;

    Ok(RecordAccess {
        alias,
        ephemeral_key: X25519PublicKey(ephemeral_key),
        nonce,
        wrapped_key,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Block conversion
// ─────────────────────────────────────────────────────────────────────────

fn block_to_value(block: &Block) -> Value {
    let entries: Vec<Value> = block
        .entries
        .iter()
        .map(|e| {
            Value::Map(vec![
                (
                    Value::Integer(entry_keys::RECORD_HASH.into()),
                    Value::Bytes(e.record_hash.0.to_vec()),
                ),
                (
                    Value::Integer(entry_keys::RECORD.into()),
                    record_to_value(&e.record, true),
                ),
            ])
        })
        .collect();

    let prior = match &block.prior_hash {
        Some(hash) => Value::Bytes(hash.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (
            Value::Integer(block_keys::CHANNEL.into()),
            Value::Text(block.channel_name.clone()),
        ),
        (
            Value::Integer(block_keys::TIMESTAMP.into()),
            Value::Integer(block.timestamp.into()),
        ),
        (
            Value::Integer(block_keys::MINER.into()),
            Value::Text(block.miner.clone()),
        ),
        (Value::Integer(block_keys::PRIOR_HASH.into()), prior),
        (
            Value::Integer(block_keys::ENTRIES.into()),
            Value::Array(entries),
        ),
        (
            Value::Integer(block_keys::NONCE.into()),
            Value::Integer(block.nonce.into()),
        ),
    ])
}

/// Decode a block from canonical bytes.
pub fn decode_block(bytes: &[u8]) -> Result<Block, CoreError> {
    let value = decode_value(bytes)?;
    let map = as_map(&value, "block")?;

    let channel_name = require_text(map, block_keys::CHANNEL, "block channel")?;
    let timestamp = require_u64(map, block_keys::TIMESTAMP, "block timestamp")?;
    let miner = require_text(map, block_keys::MINER, "block miner")?;
    let nonce = require_u64(map, block_keys::NONCE, "block nonce")?;

    let prior_hash = match map_get(map, block_keys::PRIOR_HASH) {
        Some(Value::Bytes(b)) => Some(BlockHash(bytes32(b, "block prior hash")?)),
        Some(Value::Null) | None => None,
        _ => return Err(CoreError::MalformedBlock("invalid prior hash".into())),
    };

    let entries = match map_get(map, block_keys::ENTRIES) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let map = as_map(item, "block entry")?;
                let record_hash =
                    require_bytes32(map, entry_keys::RECORD_HASH, "entry record hash")?;
                let record_value = map_get(map, entry_keys::RECORD)
                    .ok_or_else(|| CoreError::MalformedBlock("entry missing record".into()))?;
                Ok(BlockEntry {
                    record_hash: RecordHash(record_hash),
                    record: record_from_value(record_value)?,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?,
        None => Vec::new(),
        _ => return Err(CoreError::MalformedBlock("invalid entry list".into())),
    };

    Ok(Block {
        channel_name,
        timestamp,
        miner,
        prior_hash,
        entries,
        nonce,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Map decoding helpers, shared with the payload codecs
// ─────────────────────────────────────────────────────────────────────────

pub(crate) fn as_map<'a>(
    value: &'a Value,
    what: &str,
) -> Result<&'a [(Value, Value)], CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(CoreError::DecodingError(format!("{what}: expected map"))),
    }
}

pub(crate) fn map_get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
        .map(|(_, v)| v)
}

pub(crate) fn require_u64(
    map: &[(Value, Value)],
    key: u64,
    what: &str,
) -> Result<u64, CoreError> {
    match map_get(map, key) {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::DecodingError(format!("{what}: out of range"))),
        _ => Err(CoreError::DecodingError(format!("{what}: missing integer"))),
    }
}

pub(crate) fn require_text(
    map: &[(Value, Value)],
    key: u64,
    what: &str,
) -> Result<String, CoreError> {
    match map_get(map, key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        _ => Err(CoreError::DecodingError(format!("{what}: missing text"))),
    }
}

pub(crate) fn require_bytes(
    map: &[(Value, Value)],
    key: u64,
    what: &str,
) -> Result<Vec<u8>, CoreError> {
    match map_get(map, key) {
        Some(Value::Bytes(b)) => Ok(b.clone()),
        _ => Err(CoreError::DecodingError(format!("{what}: missing bytes"))),
    }
}

pub(crate) fn require_bytes32(
    map: &[(Value, Value)],
    key: u64,
    what: &str,
) -> Result<[u8; 32], CoreError> {
    match map_get(map, key) {
        Some(Value::Bytes(b)) => bytes32(b, what),
        _ => Err(CoreError::DecodingError(format!("{what}: missing bytes"))),
    }
}

pub(crate) fn bytes32(b: &[u8], what: &str) -> Result<[u8; 32], CoreError> {
    b.try_into()
        .map_err(|_| CoreError::DecodingError(format!("{what}: expected 32 bytes")))
}

// ─────────────────────────────────────────────────────────────────────────
// Canonical value encoder
// ─────────────────────────────────────────────────────────────────────────

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => panic!("floats not supported in canonical encoding"),
        _ => panic!("unsupported CBOR value type"),
    }
}

fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type, smallest form.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map with keys sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::record::Record;

    fn sample_record() -> Record {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        Record::sign(1736870400, "alice", b"hello".as_slice(), &keypair)
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let record = sample_record();
        assert_eq!(canonical_record_bytes(&record), canonical_record_bytes(&record));
    }

    #[test]
    fn test_record_roundtrip() {
        let record = sample_record();
        let bytes = canonical_record_bytes(&record);
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(record, decoded);
        assert_eq!(bytes, canonical_record_bytes(&decoded));
    }

    #[test]
    fn test_preimage_excludes_signature() {
        let record = sample_record();
        let preimage = record_preimage(&record);
        let full = canonical_record_bytes(&record);
        assert!(preimage.len() < full.len());
    }

    #[test]
    fn test_block_roundtrip() {
        let record = sample_record();
        let block = Block {
            channel_name: "Convey-Conversation".into(),
            timestamp: 1736870401,
            miner: "node".into(),
            prior_hash: Some(BlockHash::from_bytes([0x11; 32])),
            entries: vec![BlockEntry {
                record_hash: record.hash(),
                record,
            }],
            nonce: 7,
        };

        let bytes = canonical_block_bytes(&block);
        let decoded = decode_block(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn test_block_without_prior_roundtrip() {
        let block = Block {
            channel_name: "Convey-Hour".into(),
            timestamp: 0,
            miner: "node".into(),
            prior_hash: None,
            entries: Vec::new(),
            nonce: 0,
        };

        let decoded = decode_block(&canonical_block_bytes(&block)).unwrap();
        assert_eq!(decoded.prior_hash, None);
    }

    #[test]
    fn test_integer_smallest_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(5.into()), Value::Integer(50.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        assert_eq!(buf[0], 0xa2); // map of 2
        assert_eq!(buf[1], 0x00); // key 0 first
        assert_eq!(buf[3], 0x05); // key 5 second
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_record(&[0xff, 0x00, 0x12]).is_err());
        assert!(decode_block(b"not cbor at all").is_err());
    }
}
