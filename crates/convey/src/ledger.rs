//! The ledger engine: per-alias token accounting derived from chains.
//!
//! Tokens enter circulation when periodic validation chains are mined,
//! move between aliases through transactions and replies, and leave
//! circulation when records are posted or reply remainders go
//! unallocated:
//!
//! - **Minted** — mining a periodic validation chain block awards its
//!   period in tokens (hour 3600 … century 3155760000). Six chains
//!   minting in parallel average 6 tokens per second network-wide.
//! - **Burned** — posting a conversation burns its record cost; so does
//!   the root message of each conversation and the unallocated
//!   remainder of every reply.
//! - **Bought / Sold** — transaction-chain transfers, zero-sum.
//! - **Earned / Spent** — a reply of cost c sends c/2 to its parent's
//!   author, half the remainder to the grandparent's, and so on; the
//!   root takes its half and the rest burns. Integer halving rounds
//!   down, so every reply chain burns at least one token.
//!
//! The engine is additive and idempotent: each channel keeps a set of
//! already-processed block hashes, and a rescan of the same head is a
//! no-op.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use convey_chain::ChainIter;
use convey_core::{Block, BlockHash, Message, RecordHash, Transaction};

use crate::channels::{
    CONVEY_CENTURY, CONVEY_CONVERSATION, CONVEY_DAY, CONVEY_DECADE, CONVEY_HOUR,
    CONVEY_PREFIX_MESSAGE, CONVEY_TRANSACTION, CONVEY_WEEK, CONVEY_YEAR,
};
use crate::error::Result;
use crate::node::Node;

/// Periodic validation chain rewards, one token per second of period.
pub const HOURLY_PVC_REWARD: u64 = 3_600;
pub const DAILY_PVC_REWARD: u64 = 86_400;
pub const WEEKLY_PVC_REWARD: u64 = 604_800;
pub const YEARLY_PVC_REWARD: u64 = 31_557_600;
pub const DECENNIALLY_PVC_REWARD: u64 = 315_576_000;
pub const CENTENNIALLY_PVC_REWARD: u64 = 3_155_760_000;

fn pvc_reward(channel: &str) -> Option<u64> {
    match channel {
        CONVEY_HOUR => Some(HOURLY_PVC_REWARD),
        CONVEY_DAY => Some(DAILY_PVC_REWARD),
        CONVEY_WEEK => Some(WEEKLY_PVC_REWARD),
        CONVEY_YEAR => Some(YEARLY_PVC_REWARD),
        CONVEY_DECADE => Some(DECENNIALLY_PVC_REWARD),
        CONVEY_CENTURY => Some(CENTENNIALLY_PVC_REWARD),
        _ => None,
    }
}

/// Pure per-alias accumulators. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBook {
    aliases: HashSet<String>,
    minted: HashMap<String, u64>,
    burned: HashMap<String, u64>,
    bought: HashMap<String, u64>,
    sold: HashMap<String, u64>,
    earned: HashMap<String, u64>,
    spent: HashMap<String, u64>,
}

fn record(map: &mut HashMap<String, u64>, alias: &str, amount: u64) {
    *map.entry(alias.to_string()).or_insert(0) += amount;
}

fn lookup(map: &HashMap<String, u64>, alias: &str) -> u64 {
    map.get(alias).copied().unwrap_or(0)
}

impl LedgerBook {
    pub fn record_minted(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.minted, alias, amount);
    }

    pub fn record_burned(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.burned, alias, amount);
    }

    pub fn record_bought(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.bought, alias, amount);
    }

    pub fn record_sold(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.sold, alias, amount);
    }

    pub fn record_earned(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.earned, alias, amount);
    }

    pub fn record_spent(&mut self, alias: &str, amount: u64) {
        self.aliases.insert(alias.to_string());
        record(&mut self.spent, alias, amount);
    }

    pub fn minted(&self, alias: &str) -> u64 {
        lookup(&self.minted, alias)
    }

    pub fn burned(&self, alias: &str) -> u64 {
        lookup(&self.burned, alias)
    }

    pub fn bought(&self, alias: &str) -> u64 {
        lookup(&self.bought, alias)
    }

    pub fn sold(&self, alias: &str) -> u64 {
        lookup(&self.sold, alias)
    }

    pub fn earned(&self, alias: &str) -> u64 {
        lookup(&self.earned, alias)
    }

    pub fn spent(&self, alias: &str) -> u64 {
        lookup(&self.spent, alias)
    }

    /// Every alias that has appeared in any accumulator.
    pub fn aliases(&self) -> &HashSet<String> {
        &self.aliases
    }

    /// Signed balance: credits minus debits.
    pub fn balance(&self, alias: &str) -> i64 {
        let credits = self.minted(alias) + self.bought(alias) + self.earned(alias);
        let debits = self.burned(alias) + self.sold(alias) + self.spent(alias);
        credits as i64 - debits as i64
    }

    pub fn total_bought(&self) -> u64 {
        self.bought.values().sum()
    }

    pub fn total_sold(&self) -> u64 {
        self.sold.values().sum()
    }

    pub fn total_earned(&self) -> u64 {
        self.earned.values().sum()
    }

    pub fn total_spent(&self) -> u64 {
        self.spent.values().sum()
    }
}

#[derive(Default)]
struct LedgerState {
    book: LedgerBook,
    /// Channel name to the block hashes already counted.
    processed: HashMap<String, HashSet<BlockHash>>,
}

struct MessageNode {
    author: String,
    cost: u64,
    previous: Option<RecordHash>,
}

/// The ledger engine over a node's channels.
pub struct Ledger {
    node: Arc<Node>,
    state: Mutex<LedgerState>,
    trigger: std::sync::Mutex<Option<mpsc::Sender<()>>>,
}

impl Ledger {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            state: Mutex::new(LedgerState::default()),
            trigger: std::sync::Mutex::new(None),
        }
    }

    /// Snapshot of the accumulators.
    pub async fn book(&self) -> LedgerBook {
        self.state.lock().await.book.clone()
    }

    /// Signed balance for one alias.
    pub async fn balance(&self, alias: &str) -> i64 {
        self.state.lock().await.book.balance(alias)
    }

    /// Fold a channel's new blocks into the accumulators.
    ///
    /// Walks backward from the head and stops at the first block already
    /// processed; message chains instead take a full walk so replies in
    /// new blocks can resolve parents in old ones.
    pub async fn update(&self, channel_name: &str, head: Option<BlockHash>) -> Result<()> {
        let Some(head) = head else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        let LedgerState { book, processed } = &mut *state;
        let processed = processed.entry(channel_name.to_string()).or_default();

        if let Some(reward) = pvc_reward(channel_name) {
            self.for_each_new_block(processed, channel_name, head, |_, block| {
                book.record_minted(&block.miner, reward);
                Ok(())
            })
            .await
        } else if channel_name == CONVEY_TRANSACTION {
            self.for_each_new_block(processed, channel_name, head, |_, block| {
                for entry in &block.entries {
                    let transaction = Transaction::from_bytes(&entry.record.payload)?;
                    book.record_sold(&transaction.sender, transaction.amount);
                    book.record_bought(&transaction.receiver, transaction.amount);
                }
                Ok(())
            })
            .await
        } else if channel_name == CONVEY_CONVERSATION {
            self.for_each_new_block(processed, channel_name, head, |_, block| {
                for entry in &block.entries {
                    book.record_burned(&entry.record.creator, entry.record.cost());
                }
                Ok(())
            })
            .await
        } else if channel_name.starts_with(CONVEY_PREFIX_MESSAGE) {
            self.update_message_chain(book, processed, channel_name, head)
                .await
        } else {
            // Unknown channels carry no economic weight.
            Ok(())
        }
    }

    /// Walk new blocks backward, marking each processed before its
    /// effects are recorded.
    async fn for_each_new_block(
        &self,
        processed: &mut HashSet<BlockHash>,
        channel: &str,
        head: BlockHash,
        mut f: impl FnMut(&BlockHash, &Block) -> Result<()>,
    ) -> Result<()> {
        let mut iter = ChainIter::new(channel, Some(head), self.node.cache(), self.node.network());
        while let Some((hash, block)) = iter.next().await? {
            if !processed.insert(hash) {
                break;
            }
            f(&hash, &block)?;
        }
        Ok(())
    }

    /// Message chains take two passes.
    ///
    /// Pass 1 walks the full chain to map every message, because a reply
    /// in a new block may point at a parent sealed long ago. Pass 2
    /// distributes tokens for messages in not-yet-processed blocks:
    /// roots burn their cost, replies pay ancestors by repeated halving.
    async fn update_message_chain(
        &self,
        book: &mut LedgerBook,
        processed: &mut HashSet<BlockHash>,
        channel: &str,
        head: BlockHash,
    ) -> Result<()> {
        let mut nodes: HashMap<RecordHash, MessageNode> = HashMap::new();
        let mut block_of: HashMap<RecordHash, BlockHash> = HashMap::new();
        let mut seen_blocks: Vec<BlockHash> = Vec::new();

        let mut iter = ChainIter::new(channel, Some(head), self.node.cache(), self.node.network());
        while let Some((block_hash, block)) = iter.next().await? {
            seen_blocks.push(block_hash);
            for entry in &block.entries {
                let message = Message::from_bytes(&entry.record.payload)?;
                block_of.insert(entry.record_hash, block_hash);
                nodes.insert(
                    entry.record_hash,
                    MessageNode {
                        author: entry.record.creator.clone(),
                        cost: entry.record.cost(),
                        previous: message.previous,
                    },
                );
            }
        }

        for (hash, node) in &nodes {
            if block_of.get(hash).is_some_and(|b| processed.contains(b)) {
                continue;
            }

            match node.previous {
                None => book.record_burned(&node.author, node.cost),
                Some(first_parent) => {
                    let mut remaining = node.cost;
                    let mut parent_hash = first_parent;
                    while remaining > 0 {
                        // An ancestor missing from the chain ends the
                        // walk; the remainder is dropped, not credited.
                        let Some(parent) = nodes.get(&parent_hash) else {
                            break;
                        };
                        let half = remaining / 2;
                        book.record_spent(&node.author, half);
                        book.record_earned(&parent.author, half);
                        match parent.previous {
                            None => {
                                book.record_burned(&node.author, remaining - half);
                                break;
                            }
                            Some(next) => {
                                remaining -= half;
                                parent_hash = next;
                            }
                        }
                    }
                }
            }
        }

        // Marks blocks whose entries were all counted earlier too;
        // their contents are already in the accumulators.
        for block in seen_blocks {
            processed.insert(block);
        }

        Ok(())
    }

    /// Run `update` over every channel the node knows.
    pub async fn update_all(&self) -> Result<()> {
        for (name, head) in self.node.channel_heads().await {
            self.update(&name, head).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Background worker
    // ─────────────────────────────────────────────────────────────────────

    /// Spawn the update worker: one `update_all` pass now, then one per
    /// trigger. Dropping the trigger (via [`Ledger::stop`]) ends the
    /// task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        *self.trigger.lock().unwrap() = Some(tx);

        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(err) = ledger.update_all().await {
                    error!(%err, "ledger update failed");
                    return;
                }
                if rx.recv().await.is_none() {
                    debug!("ledger trigger closed, worker exiting");
                    return;
                }
            }
        })
    }

    /// Ask the worker for another pass. A no-op when the worker is not
    /// running.
    pub async fn trigger_update(&self) {
        let tx = self.trigger.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }

    /// Close the trigger, terminating the worker after its current pass.
    pub fn stop(&self) {
        self.trigger.lock().unwrap().take();
    }
}
