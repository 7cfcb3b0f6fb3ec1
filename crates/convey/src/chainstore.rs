//! The chain-backed store: conversations, messages, users, and yield
//! derived from the node's channels.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use convey_chain::{
    ChainIter, Channel, KeyDirectory, MiningListener, NoopListener, THRESHOLD_G,
};
use convey_core::{
    AliasRegistration, Keypair, Message, Record, RecordHash, Registration,
};
use tokio::sync::Mutex;

use crate::channels::{
    message_channel_name, signed_channel, CONVEY_ALIAS, CONVEY_CONVERSATION, CONVEY_REGISTRATION,
};
use crate::error::{ConveyError, Result};
use crate::keystore::KeyStore;
use crate::node::{timestamp, Node};
use crate::store::{
    listing_from_entry, ConversationStore, Listing, MessageStore, MessageView, UserStore,
};

/// Store implementation backed by the node's proof-of-work chains.
pub struct ChainStore {
    node: Arc<Node>,
    keystore: KeyStore,
    /// Alias-to-key bindings; message channels this store opens verify
    /// signatures against it, and alias registrations feed it.
    directory: Arc<dyn KeyDirectory>,
    /// Threshold for message channels this store opens.
    content_threshold: u32,
    listener: Arc<dyn MiningListener>,
}

impl ChainStore {
    pub fn new(node: Arc<Node>, keystore: KeyStore, directory: Arc<dyn KeyDirectory>) -> Self {
        Self {
            node,
            keystore,
            directory,
            content_threshold: THRESHOLD_G,
            listener: Arc::new(NoopListener),
        }
    }

    /// Override the threshold used for message channels opened by this
    /// store. Tests run at zero.
    pub fn with_content_threshold(mut self, threshold: u32) -> Self {
        self.content_threshold = threshold;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn MiningListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Queue a record, mine it into the channel, and push the result.
    ///
    /// Pushes are best-effort: a partially connected node still writes.
    async fn mine_block_entry(&self, channel: &Arc<Mutex<Channel>>, record: Record) -> Result<()> {
        let (name, threshold) = {
            let channel = channel.lock().await;
            (channel.name().to_string(), channel.threshold())
        };

        self.node.write_record(&name, record).await?;
        self.node
            .mine(channel, threshold, self.listener.as_ref())
            .await?;

        if let Some(network) = self.node.network() {
            let channel = channel.lock().await;
            if let Err(err) = channel.push(self.node.cache(), network).await {
                warn!(channel = %name, %err, "push failed");
            }
        }

        Ok(())
    }

    /// Best-effort refresh of a channel from cache and peers.
    async fn refresh(&self, channel: &Arc<Mutex<Channel>>) {
        let mut channel = channel.lock().await;
        if let Err(err) = channel.load_cached_head(self.node.cache()).await {
            warn!(channel = channel.name(), %err, "loading cached head failed");
        }
        if let Some(network) = self.node.network() {
            if let Err(err) = channel.pull(self.node.cache(), network).await {
                warn!(channel = channel.name(), %err, "pull failed");
            }
        }
    }

    fn message_channel(&self, conversation_hash: &RecordHash) -> Result<Arc<Mutex<Channel>>> {
        let name = message_channel_name(conversation_hash);
        self.node
            .channel(&name)
            .map_err(|_| ConveyError::NoSuchConversation(conversation_hash.to_base64()))
    }
}

#[async_trait]
impl ConversationStore for ChainStore {
    async fn new_conversation(
        &self,
        conversation_hash: RecordHash,
        conversation_record: Record,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()> {
        debug_assert_eq!(conversation_hash, conversation_record.hash());
        debug_assert_eq!(message_hash, message_record.hash());

        let conversations = self.node.channel(CONVEY_CONVERSATION)?;
        self.mine_block_entry(&conversations, conversation_record)
            .await?;

        let messages = self.node.add_channel(signed_channel(
            message_channel_name(&conversation_hash),
            self.content_threshold,
            self.directory.clone(),
        ));
        self.mine_block_entry(&messages, message_record).await?;

        Ok(())
    }

    async fn get_conversation(&self, conversation_hash: &RecordHash) -> Result<Listing> {
        let conversations = self.node.channel(CONVEY_CONVERSATION)?;
        let head = conversations.lock().await.head();

        let mut iter = ChainIter::new(
            CONVEY_CONVERSATION,
            head,
            self.node.cache(),
            self.node.network(),
        );
        while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                if entry.record_hash == *conversation_hash {
                    return listing_from_entry(entry);
                }
            }
        }

        Err(ConveyError::NoSuchConversation(
            conversation_hash.to_base64(),
        ))
    }

    async fn get_all_conversations(&self, from: u64, to: u64) -> Result<Vec<Listing>> {
        let conversations = self.node.channel(CONVEY_CONVERSATION)?;
        let head = conversations.lock().await.head();

        let mut listings = Vec::new();
        let mut iter = ChainIter::new(
            CONVEY_CONVERSATION,
            head,
            self.node.cache(),
            self.node.network(),
        );
        while let Some((_, block)) = iter.next().await? {
            // Blocks are roughly descending by time; anything older than
            // the window ends the walk.
            if block.timestamp < from {
                break;
            }
            for entry in &block.entries {
                if entry.record.timestamp >= from && entry.record.timestamp <= to {
                    listings.push(listing_from_entry(entry)?);
                }
            }
        }
        Ok(listings)
    }

    async fn get_recent_conversations(&self, limit: usize) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        if limit == 0 {
            return Ok(listings);
        }

        let conversations = self.node.channel(CONVEY_CONVERSATION)?;
        let head = conversations.lock().await.head();

        let mut iter = ChainIter::new(
            CONVEY_CONVERSATION,
            head,
            self.node.cache(),
            self.node.network(),
        );
        'walk: while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                listings.push(listing_from_entry(entry)?);
                if listings.len() >= limit {
                    break 'walk;
                }
            }
        }
        Ok(listings)
    }
}

#[async_trait]
impl MessageStore for ChainStore {
    async fn add_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: RecordHash,
        message_record: Record,
    ) -> Result<()> {
        debug_assert_eq!(message_hash, message_record.hash());

        let messages = self.message_channel(conversation_hash)?;
        self.mine_block_entry(&messages, message_record).await
    }

    async fn get_message(
        &self,
        conversation_hash: &RecordHash,
        message_hash: Option<&RecordHash>,
        callback: &mut (dyn FnMut(MessageView) -> ControlFlow<()> + Send),
    ) -> Result<()> {
        let messages = self.message_channel(conversation_hash)?;
        let (name, head) = {
            let channel = messages.lock().await;
            (channel.name().to_string(), channel.head())
        };

        let mut iter = ChainIter::new(&name, head, self.node.cache(), self.node.network());
        while let Some((_, block)) = iter.next().await? {
            for entry in &block.entries {
                if message_hash.is_some_and(|wanted| *wanted != entry.record_hash) {
                    continue;
                }
                let message = Message::from_bytes(&entry.record.payload)?;
                let view = MessageView {
                    hash: entry.record_hash,
                    timestamp: entry.record.timestamp,
                    author: entry.record.creator.clone(),
                    cost: entry.record.cost(),
                    message,
                };
                if let ControlFlow::Break(()) = callback(view) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn get_yield(&self, conversation_hash: &RecordHash) -> Result<(u64, u64)> {
        struct ReplyNode {
            previous: RecordHash,
            cost: u64,
        }

        let mut root_hash: Option<RecordHash> = None;
        let mut root_cost = 0u64;
        let mut replies: HashMap<RecordHash, ReplyNode> = HashMap::new();

        self.get_message(conversation_hash, None, &mut |view| {
            match view.message.previous {
                None => {
                    root_hash = Some(view.hash);
                    root_cost = view.cost;
                }
                Some(previous) => {
                    replies.insert(
                        view.hash,
                        ReplyNode {
                            previous,
                            cost: view.cost,
                        },
                    );
                }
            }
            ControlFlow::Continue(())
        })
        .await?;

        let mut root_reward = 0u64;
        for reply in replies.values() {
            let mut current = reply;
            let mut remaining = reply.cost;
            // Half of the remainder travels one ancestor up per step;
            // the walk ends at the root or at a break in the chain.
            while remaining > 0 {
                let half = remaining / 2;
                if Some(current.previous) == root_hash {
                    root_reward += half;
                    break;
                }
                match replies.get(&current.previous) {
                    Some(parent) => {
                        current = parent;
                        remaining -= half;
                    }
                    None => break,
                }
            }
        }

        Ok((root_cost, root_reward))
    }
}

#[async_trait]
impl UserStore for ChainStore {
    async fn add_key(&self, alias: &str, password: &[u8], keypair: Keypair) -> Result<()> {
        self.keystore.add(alias, password, &keypair)
    }

    async fn get_key(&self, alias: &str, password: &[u8]) -> Result<Keypair> {
        self.keystore.get(alias, password)
    }

    async fn has_key(&self, alias: &str) -> bool {
        self.keystore.has(alias)
    }

    async fn register_alias(&self, alias: &str, keypair: &Keypair) -> Result<()> {
        let aliases = self.node.channel(CONVEY_ALIAS)?;

        let registration = AliasRegistration {
            alias: alias.to_string(),
            public_key: keypair.public_key(),
            agreement_key: keypair.agreement_key(),
        };
        let record = Record::sign(timestamp(), alias, registration.to_bytes(), keypair);

        self.mine_block_entry(&aliases, record).await?;

        // Once the binding is on the chain, hold its author to it.
        self.directory.bind(alias, keypair.public_key());
        Ok(())
    }

    async fn register_customer(
        &self,
        alias: &str,
        keypair: &Keypair,
        customer_id: &str,
    ) -> Result<()> {
        let registrations = self.node.channel(CONVEY_REGISTRATION)?;
        self.refresh(&registrations).await;

        let registration = Registration {
            merchant: self.node.alias().to_string(),
            customer: alias.to_string(),
            processor: "stripe".to_string(),
            customer_id: customer_id.to_string(),
        };

        // Sealed for the customer and the merchant node only.
        let acl = vec![
            (alias.to_string(), keypair.agreement_key()),
            (
                self.node.alias().to_string(),
                self.node.keypair().agreement_key(),
            ),
        ];
        self.node
            .write(
                timestamp(),
                CONVEY_REGISTRATION,
                &acl,
                &registration.to_bytes(),
            )
            .await?;

        let threshold = registrations.lock().await.threshold();
        self.node
            .mine(&registrations, threshold, self.listener.as_ref())
            .await?;

        if let Some(network) = self.node.network() {
            let channel = registrations.lock().await;
            if let Err(err) = channel.push(self.node.cache(), network).await {
                warn!(channel = CONVEY_REGISTRATION, %err, "push failed");
            }
        }

        Ok(())
    }

    async fn get_registration(&self, alias: &str) -> Result<Option<Registration>> {
        let registrations = self.node.channel(CONVEY_REGISTRATION)?;

        let mut found: Option<Registration> = None;
        let mut parse_error: Option<convey_core::CoreError> = None;
        self.node
            .read_payloads(&registrations, &mut |_, payload| {
                match Registration::from_bytes(payload) {
                    Ok(registration) if registration.customer == alias => {
                        found = Some(registration);
                        ControlFlow::Break(())
                    }
                    Ok(_) => ControlFlow::Continue(()),
                    Err(err) => {
                        parse_error = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })
            .await?;

        if let Some(err) = parse_error {
            return Err(err.into());
        }
        Ok(found)
    }
}
