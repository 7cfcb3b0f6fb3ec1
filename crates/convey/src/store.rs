//! Store contracts: users, conversations, messages, yield.
//!
//! Two implementations share these traits: the chain-backed store and an
//! in-memory store for tests and previews. Semantics are identical
//! except where the in-memory variant documents a stub.

use std::ops::ControlFlow;

use async_trait::async_trait;

use convey_core::{BlockEntry, Conversation, Keypair, Message, Record, RecordHash, Registration};

use crate::error::Result;

/// A derived view of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub hash: RecordHash,
    pub timestamp: u64,
    pub author: String,
    pub topic: String,
    pub cost: u64,
}

/// One message as handed to a [`MessageStore::get_message`] callback.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub hash: RecordHash,
    pub timestamp: u64,
    pub author: String,
    pub cost: u64,
    pub message: Message,
}

/// Build a listing from a conversation-chain entry.
pub fn listing_from_entry(entry: &BlockEntry) -> Result<Listing> {
    let conversation = Conversation::from_bytes(&entry.record.payload)?;
    Ok(Listing {
        hash: entry.record_hash,
        timestamp: entry.record.timestamp,
        author: entry.record.creator.clone(),
        topic: conversation.topic,
        cost: entry.record.cost(),
    })
}

/// Key management and registration.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store key material for an alias, protected by a password.
    async fn add_key(&self, alias: &str, password: &[u8], keypair: Keypair) -> Result<()>;

    /// Recover key material. Any failure is the opaque access-denied
    /// error.
    async fn get_key(&self, alias: &str, password: &[u8]) -> Result<Keypair>;

    /// Whether key material exists for an alias.
    async fn has_key(&self, alias: &str) -> bool;

    /// Publish the alias-to-key binding on the alias chain.
    async fn register_alias(&self, alias: &str, keypair: &Keypair) -> Result<()>;

    /// Publish a payment-processor binding for a customer.
    async fn register_customer(
        &self,
        alias: &str,
        keypair: &Keypair,
        customer_id: &str,
    ) -> Result<()>;

    /// Find the registration for a customer alias, if any.
    async fn get_registration(&self, alias: &str) -> Result<Option<Registration>>;
}

/// Conversation lifecycle and queries.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Publish a conversation and its root message.
    ///
    /// The conversation-chain write and the message-chain write are
    /// independent mining operations. If the second fails the network
    /// holds a conversation without a root message; re-posting the
    /// message recovers.
    async fn new_conversation(
        &self,
        conversation_hash: RecordHash,
        conversation_record: Record,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()>;

    /// Look up one conversation by hash.
    async fn get_conversation(&self, conversation_hash: &RecordHash) -> Result<Listing>;

    /// Conversations whose record timestamp lies within `[from, to]`.
    ///
    /// The backward walk stops at the first block older than `from`;
    /// records that are out of order with their block timestamps may be
    /// missed. Accepted as a best-effort bound.
    async fn get_all_conversations(&self, from: u64, to: u64) -> Result<Vec<Listing>>;

    /// The first `limit` conversations walking backward from the head.
    async fn get_recent_conversations(&self, limit: usize) -> Result<Vec<Listing>>;
}

/// Messages and yield on top of conversations.
#[async_trait]
pub trait MessageStore: ConversationStore {
    /// Publish a message on an existing conversation's chain.
    async fn add_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()>;

    /// Visit messages on a conversation's chain.
    ///
    /// With a `message_hash` filter only the matching message is
    /// visited; otherwise every message is. The callback breaks to stop
    /// early.
    async fn get_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: Option<&RecordHash>,
        callback: &mut (dyn FnMut(MessageView) -> ControlFlow<()> + Send),
    ) -> Result<()>;

    /// The root message's `(cost, reward)` for a conversation.
    ///
    /// The reward is what the hierarchical reply rule distributes to the
    /// root: each reply sends half its remaining tokens one ancestor up
    /// until the root or a break in the chain.
    async fn get_yield(&self, conversation_hash: &RecordHash) -> Result<(u64, u64)>;
}
