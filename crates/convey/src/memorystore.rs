//! In-memory store implementation.
//!
//! Backs tests and local previews. Conversations and messages behave
//! exactly like the chain-backed store; the registration methods and
//! yield computation are stubs, matching what a preview needs.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::RwLock;

use async_trait::async_trait;

use convey_core::{Keypair, Message, Record, RecordHash, Registration};

use crate::error::{ConveyError, Result};
use crate::store::{ConversationStore, Listing, MessageStore, MessageView, UserStore};

/// Everything in maps, no chains, no mining.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    passwords: HashMap<String, Vec<u8>>,
    keys: HashMap<String, [u8; 32]>,
    conversations: HashMap<RecordHash, Record>,
    /// Conversation hash to its message hashes, insertion order.
    mappings: HashMap<RecordHash, Vec<RecordHash>>,
    messages: HashMap<RecordHash, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn add_key(&self, alias: &str, password: &[u8], keypair: Keypair) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.passwords.contains_key(alias) {
            return Err(ConveyError::KeyAlreadyExists(alias.to_string()));
        }
        inner.passwords.insert(alias.to_string(), password.to_vec());
        inner.keys.insert(alias.to_string(), keypair.seed());
        Ok(())
    }

    async fn get_key(&self, alias: &str, password: &[u8]) -> Result<Keypair> {
        let inner = self.inner.read().unwrap();
        match inner.passwords.get(alias) {
            Some(stored) if stored == password => {
                let seed = inner.keys.get(alias).ok_or(ConveyError::AccessDenied)?;
                Ok(Keypair::from_seed(seed))
            }
            _ => Err(ConveyError::AccessDenied),
        }
    }

    async fn has_key(&self, alias: &str) -> bool {
        self.inner.read().unwrap().passwords.contains_key(alias)
    }

    async fn register_alias(&self, _alias: &str, _keypair: &Keypair) -> Result<()> {
        // No alias chain in memory.
        Ok(())
    }

    async fn register_customer(
        &self,
        _alias: &str,
        _keypair: &Keypair,
        _customer_id: &str,
    ) -> Result<()> {
        // No registration chain in memory.
        Ok(())
    }

    async fn get_registration(&self, _alias: &str) -> Result<Option<Registration>> {
        Ok(None)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn new_conversation(
        &self,
        conversation_hash: RecordHash,
        conversation_record: Record,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap();
            inner
                .conversations
                .insert(conversation_hash, conversation_record);
            inner.mappings.entry(conversation_hash).or_default();
        }
        self.add_message(&conversation_hash, message_hash, message_record)
            .await
    }

    async fn get_conversation(&self, conversation_hash: &RecordHash) -> Result<Listing> {
        let inner = self.inner.read().unwrap();
        let record = inner
            .conversations
            .get(conversation_hash)
            .ok_or_else(|| ConveyError::NoSuchConversation(conversation_hash.to_base64()))?;

        let conversation = convey_core::Conversation::from_bytes(&record.payload)?;
        Ok(Listing {
            hash: *conversation_hash,
            timestamp: record.timestamp,
            author: record.creator.clone(),
            topic: conversation.topic,
            cost: record.cost(),
        })
    }

    async fn get_all_conversations(&self, from: u64, to: u64) -> Result<Vec<Listing>> {
        let inner = self.inner.read().unwrap();
        let mut listings = Vec::new();
        for (hash, record) in &inner.conversations {
            if record.timestamp >= from && record.timestamp <= to {
                let conversation = convey_core::Conversation::from_bytes(&record.payload)?;
                listings.push(Listing {
                    hash: *hash,
                    timestamp: record.timestamp,
                    author: record.creator.clone(),
                    topic: conversation.topic,
                    cost: record.cost(),
                });
            }
        }
        Ok(listings)
    }

    async fn get_recent_conversations(&self, limit: usize) -> Result<Vec<Listing>> {
        let inner = self.inner.read().unwrap();
        let mut listings = Vec::new();
        for (hash, record) in &inner.conversations {
            let conversation = convey_core::Conversation::from_bytes(&record.payload)?;
            listings.push(Listing {
                hash: *hash,
                timestamp: record.timestamp,
                author: record.creator.clone(),
                topic: conversation.topic,
                cost: record.cost(),
            });
        }
        listings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        listings.truncate(limit);
        Ok(listings)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn add_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.conversations.contains_key(conversation_hash) {
            return Err(ConveyError::NoSuchConversation(
                conversation_hash.to_base64(),
            ));
        }
        inner
            .mappings
            .entry(*conversation_hash)
            .or_default()
            .push(message_hash);
        inner.messages.insert(message_hash, message_record);
        Ok(())
    }

    async fn get_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: Option<&RecordHash>,
        callback: &mut (dyn FnMut(MessageView) -> ControlFlow<()> + Send),
    ) -> Result<()> {
        let inner = self.inner.read().unwrap();
        let mapping = inner
            .mappings
            .get(conversation_hash)
            .ok_or_else(|| ConveyError::NoSuchConversation(conversation_hash.to_base64()))?;

        for hash in mapping {
            if message_hash.is_some_and(|wanted| wanted != hash) {
                continue;
            }
            let Some(record) = inner.messages.get(hash) else {
                continue;
            };
            let message = Message::from_bytes(&record.payload)?;
            let view = MessageView {
                hash: *hash,
                timestamp: record.timestamp,
                author: record.creator.clone(),
                cost: record.cost(),
                message,
            };
            if let ControlFlow::Break(()) = callback(view) {
                break;
            }
        }
        Ok(())
    }

    async fn get_yield(&self, _conversation_hash: &RecordHash) -> Result<(u64, u64)> {
        // Yield needs chain economics; previews report zero.
        Ok((0, 0))
    }
}
