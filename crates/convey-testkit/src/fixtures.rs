//! Test fixtures and helpers.
//!
//! Common setup for integration tests: a node with the standard channels
//! at zero threshold, funded aliases, and payload-record builders.

use std::sync::Arc;

use convey::{
    signed_channel, timestamp, Node, TransactionValidator, CONVEY_CONVERSATION,
    CONVEY_TRANSACTION, CONVEY_YEAR,
};
use convey_cache::MemoryCache;
use convey_chain::{Channel, KeyDirectory, MemoryKeyDirectory, NoopListener, THRESHOLD_NONE};
use convey_core::{
    Conversation, Keypair, MediaType, Message, Record, RecordHash, Transaction,
};

/// A deterministic keypair for a numbered test party.
pub fn party_keypair(index: u8) -> Keypair {
    Keypair::from_seed(&[index; 32])
}

/// A key directory binding the standard test parties: Node is party 1,
/// then Alice, Bob, Charlie.
pub fn test_directory() -> Arc<MemoryKeyDirectory> {
    let directory = MemoryKeyDirectory::new();
    for (alias, index) in [("Node", 1u8), ("Alice", 2), ("Bob", 3), ("Charlie", 4)] {
        directory.bind(alias, party_keypair(index).public_key());
    }
    Arc::new(directory)
}

/// A node with the yearly PVC, conversation, and transaction channels
/// open at zero threshold, signature-checked against [`test_directory`].
///
/// The transaction channel here carries no creator-equals-sender
/// validator, matching the ledger suites; that rule has its own tests.
pub fn test_node(alias: &str, seed: u8) -> Arc<Node> {
    let directory = test_directory();
    let node = Arc::new(Node::new(
        alias,
        party_keypair(seed),
        Arc::new(MemoryCache::new()),
        None,
    ));
    for name in [CONVEY_YEAR, CONVEY_CONVERSATION, CONVEY_TRANSACTION] {
        node.add_channel(signed_channel(name, THRESHOLD_NONE, directory.clone()));
    }
    node
}

/// A node whose transaction channel enforces the creator-equals-sender
/// rule, still at zero threshold so tests mine instantly.
pub fn validating_test_node(alias: &str, seed: u8) -> Arc<Node> {
    let node = Arc::new(Node::new(
        alias,
        party_keypair(seed),
        Arc::new(MemoryCache::new()),
        None,
    ));
    node.add_channel(Channel::new(CONVEY_YEAR, THRESHOLD_NONE));
    node.add_channel(Channel::new(CONVEY_CONVERSATION, THRESHOLD_NONE));
    let mut transactions = Channel::new(CONVEY_TRANSACTION, THRESHOLD_NONE);
    transactions.add_validator(Arc::new(TransactionValidator));
    node.add_channel(transactions);
    node
}

/// Sign a conversation record.
pub fn conversation_record(
    alias: &str,
    keypair: &Keypair,
    topic: &str,
) -> (RecordHash, Record) {
    conversation_record_at(alias, keypair, timestamp(), topic)
}

/// Sign a conversation record with an explicit timestamp.
pub fn conversation_record_at(
    alias: &str,
    keypair: &Keypair,
    timestamp: u64,
    topic: &str,
) -> (RecordHash, Record) {
    let payload = Conversation {
        topic: topic.to_string(),
    }
    .to_bytes();
    let record = Record::sign(timestamp, alias, payload, keypair);
    (record.hash(), record)
}

/// Sign a message record; `previous` of `None` makes it a root.
pub fn message_record(
    alias: &str,
    keypair: &Keypair,
    previous: Option<RecordHash>,
    content: &[u8],
) -> (RecordHash, Record) {
    let payload = Message {
        previous,
        content: content.to_vec().into(),
        media_type: MediaType::TextPlain,
    }
    .to_bytes();
    let record = Record::sign(timestamp(), alias, payload, keypair);
    (record.hash(), record)
}

/// Mine one periodic validation block on the node's yearly chain.
pub async fn mine_yearly_pvc(node: &Arc<Node>) {
    let years = node.channel(CONVEY_YEAR).unwrap();
    node.mine_periodic_validation(&years, THRESHOLD_NONE, &NoopListener)
        .await
        .unwrap();
}

/// Mine a transaction: the node sells `amount` tokens to `receiver`.
pub async fn mine_transaction(node: &Arc<Node>, receiver: &str, amount: u64) {
    let payload = Transaction {
        sender: node.alias().to_string(),
        receiver: receiver.to_string(),
        amount,
    }
    .to_bytes();
    let record = Record::sign(timestamp(), node.alias(), payload, node.keypair());

    let transactions = node.channel(CONVEY_TRANSACTION).unwrap();
    node.write_record(CONVEY_TRANSACTION, record).await.unwrap();
    node.mine(&transactions, THRESHOLD_NONE, &NoopListener)
        .await
        .unwrap();
}
