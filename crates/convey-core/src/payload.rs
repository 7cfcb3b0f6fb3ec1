//! Payload types carried inside records.
//!
//! Each payload has a deterministic CBOR codec using the same
//! integer-keyed-map discipline as the record encoding, so a payload
//! byte-for-byte round-trips on every platform.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::canonical::{
    as_map, decode_value, encode_canonical, map_get, require_bytes, require_bytes32, require_text,
    require_u64,
};
use crate::crypto::{Ed25519PublicKey, X25519PublicKey};
use crate::error::CoreError;
use crate::types::{BlockHash, RecordHash};

/// Media type of a message's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    TextPlain,
    TextMarkdown,
    ImagePng,
    ImageJpeg,
}

impl MediaType {
    /// The canonical MIME string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::TextPlain => "text/plain",
            MediaType::TextMarkdown => "text/markdown",
            MediaType::ImagePng => "image/png",
            MediaType::ImageJpeg => "image/jpeg",
        }
    }
}

impl FromStr for MediaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text/plain" => Ok(MediaType::TextPlain),
            "text/markdown" => Ok(MediaType::TextMarkdown),
            "image/png" => Ok(MediaType::ImagePng),
            "image/jpeg" => Ok(MediaType::ImageJpeg),
            other => Err(CoreError::UnrecognizedMediaType(other.to_string())),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The root payload of a conversation: its topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub topic: String,
}

mod conversation_keys {
    pub const TOPIC: u64 = 0;
}

impl Conversation {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![(
            Value::Integer(conversation_keys::TOPIC.into()),
            Value::Text(self.topic.clone()),
        )]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "conversation")?;
        Ok(Self {
            topic: require_text(map, conversation_keys::TOPIC, "conversation topic")?,
        })
    }
}

/// A message on a conversation chain.
///
/// No `previous` marks the conversation's root message; otherwise this is
/// a reply to the referenced message on the same chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Parent message within the same conversation chain.
    pub previous: Option<RecordHash>,

    /// The message body.
    pub content: Bytes,

    /// How to interpret the body.
    pub media_type: MediaType,
}

mod message_keys {
    pub const PREVIOUS: u64 = 0;
    pub const CONTENT: u64 = 1;
    pub const MEDIA_TYPE: u64 = 2;
}

impl Message {
    /// Whether this is the root message of its conversation.
    pub fn is_root(&self) -> bool {
        self.previous.is_none()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let previous = match &self.previous {
            Some(hash) => Value::Bytes(hash.0.to_vec()),
            None => Value::Null,
        };
        encode_canonical(&Value::Map(vec![
            (Value::Integer(message_keys::PREVIOUS.into()), previous),
            (
                Value::Integer(message_keys::CONTENT.into()),
                Value::Bytes(self.content.to_vec()),
            ),
            (
                Value::Integer(message_keys::MEDIA_TYPE.into()),
                Value::Text(self.media_type.as_str().to_string()),
            ),
        ]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "message")?;

        let previous = match map_get(map, message_keys::PREVIOUS) {
            Some(Value::Bytes(b)) => Some(RecordHash(crate::canonical::bytes32(
                b,
                "message previous",
            )?)),
            Some(Value::Null) | None => None,
            _ => return Err(CoreError::DecodingError("message previous".into())),
        };

        let content = require_bytes(map, message_keys::CONTENT, "message content")?;
        let media_type =
            require_text(map, message_keys::MEDIA_TYPE, "message media type")?.parse()?;

        Ok(Self {
            previous,
            content: Bytes::from(content),
            media_type,
        })
    }
}

/// A token transfer between two aliases.
///
/// The transfer only records intent; the transaction validator requires
/// the record creator to be the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

mod transaction_keys {
    pub const SENDER: u64 = 0;
    pub const RECEIVER: u64 = 1;
    pub const AMOUNT: u64 = 2;
}

impl Transaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![
            (
                Value::Integer(transaction_keys::SENDER.into()),
                Value::Text(self.sender.clone()),
            ),
            (
                Value::Integer(transaction_keys::RECEIVER.into()),
                Value::Text(self.receiver.clone()),
            ),
            (
                Value::Integer(transaction_keys::AMOUNT.into()),
                Value::Integer(self.amount.into()),
            ),
        ]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "transaction")?;
        Ok(Self {
            sender: require_text(map, transaction_keys::SENDER, "transaction sender")?,
            receiver: require_text(map, transaction_keys::RECEIVER, "transaction receiver")?,
            amount: require_u64(map, transaction_keys::AMOUNT, "transaction amount")?,
        })
    }
}

/// Binds an alias to its key material on the alias chain.
///
/// Uniqueness is first-writer-wins at consensus level, outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRegistration {
    pub alias: String,
    pub public_key: Ed25519PublicKey,
    pub agreement_key: X25519PublicKey,
}

mod alias_keys {
    pub const ALIAS: u64 = 0;
    pub const PUBLIC_KEY: u64 = 1;
    pub const AGREEMENT_KEY: u64 = 2;
}

impl AliasRegistration {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![
            (
                Value::Integer(alias_keys::ALIAS.into()),
                Value::Text(self.alias.clone()),
            ),
            (
                Value::Integer(alias_keys::PUBLIC_KEY.into()),
                Value::Bytes(self.public_key.0.to_vec()),
            ),
            (
                Value::Integer(alias_keys::AGREEMENT_KEY.into()),
                Value::Bytes(self.agreement_key.0.to_vec()),
            ),
        ]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "alias registration")?;
        Ok(Self {
            alias: require_text(map, alias_keys::ALIAS, "alias name")?,
            public_key: Ed25519PublicKey(require_bytes32(
                map,
                alias_keys::PUBLIC_KEY,
                "alias public key",
            )?),
            agreement_key: X25519PublicKey(require_bytes32(
                map,
                alias_keys::AGREEMENT_KEY,
                "alias agreement key",
            )?),
        })
    }
}

/// A payment-processor binding between a merchant and a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub merchant: String,
    pub customer: String,
    pub processor: String,
    pub customer_id: String,
}

mod registration_keys {
    pub const MERCHANT: u64 = 0;
    pub const CUSTOMER: u64 = 1;
    pub const PROCESSOR: u64 = 2;
    pub const CUSTOMER_ID: u64 = 3;
}

impl Registration {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![
            (
                Value::Integer(registration_keys::MERCHANT.into()),
                Value::Text(self.merchant.clone()),
            ),
            (
                Value::Integer(registration_keys::CUSTOMER.into()),
                Value::Text(self.customer.clone()),
            ),
            (
                Value::Integer(registration_keys::PROCESSOR.into()),
                Value::Text(self.processor.clone()),
            ),
            (
                Value::Integer(registration_keys::CUSTOMER_ID.into()),
                Value::Text(self.customer_id.clone()),
            ),
        ]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "registration")?;
        Ok(Self {
            merchant: require_text(map, registration_keys::MERCHANT, "registration merchant")?,
            customer: require_text(map, registration_keys::CUSTOMER, "registration customer")?,
            processor: require_text(map, registration_keys::PROCESSOR, "registration processor")?,
            customer_id: require_text(
                map,
                registration_keys::CUSTOMER_ID,
                "registration customer id",
            )?,
        })
    }
}

/// One channel-head observation inside a periodic validation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHead {
    pub channel: String,
    pub head: BlockHash,
}

mod channel_head_keys {
    pub const CHANNEL: u64 = 0;
    pub const HEAD: u64 = 1;
}

impl ChannelHead {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![
            (
                Value::Integer(channel_head_keys::CHANNEL.into()),
                Value::Text(self.channel.clone()),
            ),
            (
                Value::Integer(channel_head_keys::HEAD.into()),
                Value::Bytes(self.head.0.to_vec()),
            ),
        ]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = as_map(&value, "channel head")?;
        Ok(Self {
            channel: require_text(map, channel_head_keys::CHANNEL, "channel head name")?,
            head: BlockHash(require_bytes32(
                map,
                channel_head_keys::HEAD,
                "channel head hash",
            )?),
        })
    }
}
