//! Store contract tests, run against both implementations.
//!
//! The shared suites assert identical semantics from the chain-backed
//! and in-memory stores; store-specific behavior (yield, keystore
//! persistence) is covered separately.

use std::ops::ControlFlow;
use std::sync::Arc;

use convey::{
    ChainStore, ConversationStore, ConveyError, KeyStore, MemoryStore, MessageStore, Node,
    UserStore,
};
use convey_chain::THRESHOLD_NONE;
use convey_core::{Keypair, RecordHash};
use convey_testkit::{
    conversation_record, conversation_record_at, message_record, party_keypair, test_directory,
    test_node,
};

fn chain_store(node: Arc<Node>, dir: &tempfile::TempDir) -> ChainStore {
    ChainStore::new(node, KeyStore::new(dir.path()), test_directory())
        .with_content_threshold(THRESHOLD_NONE)
}

// ─────────────────────────────────────────────────────────────────────────
// Shared suites
// ─────────────────────────────────────────────────────────────────────────

async fn suite_add_key_exists(store: &dyn UserStore) {
    let keypair = Keypair::generate();
    store.add_key("alice", b"pw", keypair.clone()).await.unwrap();

    let err = store.add_key("alice", b"pw", keypair).await.unwrap_err();
    assert_eq!(err.to_string(), "Key already exists: alice");
}

async fn suite_get_key(store: &dyn UserStore) {
    let keypair = Keypair::generate();
    store.add_key("alice", b"pw", keypair.clone()).await.unwrap();

    // Wrong password is opaque.
    let err = store.get_key("alice", b"pwpw").await.unwrap_err();
    assert_eq!(err.to_string(), "Access denied");

    let restored = store.get_key("alice", b"pw").await.unwrap();
    assert_eq!(restored.public_key(), keypair.public_key());

    // Unknown alias is equally opaque.
    let err = store.get_key("nobody", b"pw").await.unwrap_err();
    assert_eq!(err.to_string(), "Access denied");
}

async fn suite_has_key(store: &dyn UserStore) {
    assert!(!store.has_key("alice").await);
    store
        .add_key("alice", b"pw", Keypair::generate())
        .await
        .unwrap();
    assert!(store.has_key("alice").await);
}

async fn suite_get_conversation(store: &dyn MessageStore) {
    let alice = party_keypair(2);
    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Test123");
    let (message_hash, message) = message_record("Alice", &alice, None, b"FooBar");
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    let listing = store.get_conversation(&conversation_hash).await.unwrap();
    assert_eq!(listing.topic, "Test123");
    assert_eq!(listing.author, "Alice");
    assert_eq!(listing.hash, conversation_hash);
    assert!(listing.cost >= 1);
}

async fn suite_get_conversation_not_exists(store: &dyn MessageStore) {
    let missing = RecordHash::from_bytes([0xd0; 32]);
    let err = store.get_conversation(&missing).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("No such conversation: {}", missing.to_base64())
    );
}

async fn suite_get_all_conversations(store: &dyn MessageStore) {
    assert!(store.get_all_conversations(0, u64::MAX).await.unwrap().is_empty());

    let alice = party_keypair(2);

    // One conversation at the epoch, one now.
    let (old_hash, old_conversation) = conversation_record_at("Alice", &alice, 0, "Foo");
    let (old_msg_hash, old_msg) = message_record("Alice", &alice, None, b"Test123");
    store
        .new_conversation(old_hash, old_conversation, old_msg_hash, old_msg)
        .await
        .unwrap();

    let (new_hash, new_conversation) = conversation_record("Alice", &alice, "Bar");
    let (new_msg_hash, new_msg) = message_record("Alice", &alice, None, b"Test456");
    store
        .new_conversation(new_hash, new_conversation, new_msg_hash, new_msg)
        .await
        .unwrap();

    // The full window sees both.
    let all = store.get_all_conversations(0, u64::MAX).await.unwrap();
    assert_eq!(all.len(), 2);

    // Since 1 excludes the epoch conversation.
    let recent = store.get_all_conversations(1, u64::MAX).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].topic, "Bar");

    // An inverted window is empty.
    assert!(store.get_all_conversations(10, 2).await.unwrap().is_empty());
}

async fn suite_get_recent_conversations(store: &dyn MessageStore) {
    assert!(store.get_recent_conversations(1).await.unwrap().is_empty());

    let alice = party_keypair(2);
    for (topic, at) in [("Foo", 100), ("Bar", 200)] {
        let (hash, conversation) = conversation_record_at("Alice", &alice, at, topic);
        let (msg_hash, msg) = message_record("Alice", &alice, None, topic.as_bytes());
        store
            .new_conversation(hash, conversation, msg_hash, msg)
            .await
            .unwrap();
    }

    // Zero limit is an empty list.
    assert!(store.get_recent_conversations(0).await.unwrap().is_empty());

    // A limit of one returns only the newest.
    let recent = store.get_recent_conversations(1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].topic, "Bar");

    let both = store.get_recent_conversations(10).await.unwrap();
    assert_eq!(both.len(), 2);
}

async fn suite_add_message(store: &dyn MessageStore) {
    let alice = party_keypair(2);
    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Test123");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    let (reply_hash, reply) = message_record("Alice", &alice, Some(message_hash), b"Bar");
    store
        .add_message(&conversation_hash, reply_hash, reply)
        .await
        .unwrap();
}

async fn suite_add_message_not_exists(store: &dyn MessageStore) {
    let alice = party_keypair(2);
    let missing = RecordHash::from_bytes([0xd1; 32]);
    let (reply_hash, reply) = message_record("Alice", &alice, None, b"FooBar");

    let err = store
        .add_message(&missing, reply_hash, reply)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("No such conversation: {}", missing.to_base64())
    );
}

async fn suite_get_message(store: &dyn MessageStore) {
    let alice = party_keypair(2);
    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Test123");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    let (reply_hash, reply) = message_record("Alice", &alice, Some(message_hash), b"Bar");
    store
        .add_message(&conversation_hash, reply_hash, reply)
        .await
        .unwrap();

    // Unfiltered: both messages.
    let mut seen = Vec::new();
    store
        .get_message(&conversation_hash, None, &mut |view| {
            seen.push((view.hash, view.message.content.to_vec()));
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&(message_hash, b"Foo".to_vec())));
    assert!(seen.contains(&(reply_hash, b"Bar".to_vec())));

    // Filtered by hash: just the reply.
    let mut seen = Vec::new();
    store
        .get_message(&conversation_hash, Some(&reply_hash), &mut |view| {
            seen.push((view.hash, view.message.content.to_vec()));
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(seen, vec![(reply_hash, b"Bar".to_vec())]);
}

async fn suite_get_message_not_exists(store: &dyn MessageStore) {
    let missing = RecordHash::from_bytes([0xd2; 32]);
    let mut count = 0;
    let err = store
        .get_message(&missing, None, &mut |_| {
            count += 1;
            ControlFlow::Continue(())
        })
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("No such conversation: {}", missing.to_base64())
    );
    assert_eq!(count, 0);
}

async fn suite_get_message_stops_on_break(store: &dyn MessageStore) {
    let alice = party_keypair(2);
    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Test123");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();
    let (reply_hash, reply) = message_record("Alice", &alice, Some(message_hash), b"Bar");
    store
        .add_message(&conversation_hash, reply_hash, reply)
        .await
        .unwrap();

    let mut count = 0;
    store
        .get_message(&conversation_hash, None, &mut |_| {
            count += 1;
            ControlFlow::Break(())
        })
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ─────────────────────────────────────────────────────────────────────────
// Chain-backed store
// ─────────────────────────────────────────────────────────────────────────

macro_rules! chain_suite {
    ($name:ident, $suite:ident) => {
        #[tokio::test]
        async fn $name() {
            let dir = tempfile::tempdir().unwrap();
            let store = chain_store(test_node("Node", 1), &dir);
            $suite(&store).await;
        }
    };
}

chain_suite!(test_chain_add_key_exists, suite_add_key_exists);
chain_suite!(test_chain_get_key, suite_get_key);
chain_suite!(test_chain_has_key, suite_has_key);
chain_suite!(test_chain_get_conversation, suite_get_conversation);
chain_suite!(
    test_chain_get_conversation_not_exists,
    suite_get_conversation_not_exists
);
chain_suite!(test_chain_get_all_conversations, suite_get_all_conversations);
chain_suite!(
    test_chain_get_recent_conversations,
    suite_get_recent_conversations
);
chain_suite!(test_chain_add_message, suite_add_message);
chain_suite!(test_chain_add_message_not_exists, suite_add_message_not_exists);
chain_suite!(test_chain_get_message, suite_get_message);
chain_suite!(test_chain_get_message_not_exists, suite_get_message_not_exists);
chain_suite!(
    test_chain_get_message_stops_on_break,
    suite_get_message_stops_on_break
);

// ─────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────

macro_rules! memory_suite {
    ($name:ident, $suite:ident) => {
        #[tokio::test]
        async fn $name() {
            let store = MemoryStore::new();
            $suite(&store).await;
        }
    };
}

memory_suite!(test_memory_add_key_exists, suite_add_key_exists);
memory_suite!(test_memory_get_key, suite_get_key);
memory_suite!(test_memory_has_key, suite_has_key);
memory_suite!(test_memory_get_conversation, suite_get_conversation);
memory_suite!(
    test_memory_get_conversation_not_exists,
    suite_get_conversation_not_exists
);
memory_suite!(test_memory_get_all_conversations, suite_get_all_conversations);
memory_suite!(
    test_memory_get_recent_conversations,
    suite_get_recent_conversations
);
memory_suite!(test_memory_add_message, suite_add_message);
memory_suite!(test_memory_add_message_not_exists, suite_add_message_not_exists);
memory_suite!(test_memory_get_message, suite_get_message);
memory_suite!(test_memory_get_message_not_exists, suite_get_message_not_exists);
memory_suite!(
    test_memory_get_message_stops_on_break,
    suite_get_message_stops_on_break
);

// ─────────────────────────────────────────────────────────────────────────
// Chain-specific behavior
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chain_yield_empty_and_with_reply() {
    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(test_node("Node", 1), &dir);
    let alice = party_keypair(2);
    let bob = party_keypair(3);

    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Yield");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    let root_cost = message.cost();
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    assert_eq!(
        store.get_yield(&conversation_hash).await.unwrap(),
        (root_cost, 0)
    );

    let (reply_hash, reply) = message_record("Bob", &bob, Some(message_hash), b"Bar");
    let reply_cost = reply.cost();
    store
        .add_message(&conversation_hash, reply_hash, reply)
        .await
        .unwrap();

    assert_eq!(
        store.get_yield(&conversation_hash).await.unwrap(),
        (root_cost, reply_cost / 2)
    );
}

#[tokio::test]
async fn test_chain_yield_orphan_reply_drops_remainder() {
    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(test_node("Node", 1), &dir);
    let alice = party_keypair(2);
    let bob = party_keypair(3);

    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Orphan");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    let root_cost = message.cost();
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    // A reply pointing at a parent that is not on this chain.
    let phantom = RecordHash::from_bytes([0x77; 32]);
    let (orphan_hash, orphan) = message_record("Bob", &bob, Some(phantom), b"Lost");
    store
        .add_message(&conversation_hash, orphan_hash, orphan)
        .await
        .unwrap();

    // Nothing reaches the root.
    assert_eq!(
        store.get_yield(&conversation_hash).await.unwrap(),
        (root_cost, 0)
    );
}

#[tokio::test]
async fn test_chain_yield_of_empty_message_chain_is_zero() {
    let node = test_node("Node", 1);
    let conversation_hash = RecordHash::from_bytes([0x55; 32]);

    // A message channel that exists but has no blocks yet.
    node.add_channel(convey_chain::Channel::new(
        convey::message_channel_name(&conversation_hash),
        THRESHOLD_NONE,
    ));

    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(node, &dir);
    assert_eq!(store.get_yield(&conversation_hash).await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_memory_yield_is_stubbed() {
    let store = MemoryStore::new();
    let alice = party_keypair(2);
    let (conversation_hash, conversation) = conversation_record("Alice", &alice, "Stub");
    let (message_hash, message) = message_record("Alice", &alice, None, b"Foo");
    store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap();

    assert_eq!(store.get_yield(&conversation_hash).await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_chain_rejects_forged_creator() {
    // Party 9 posts a conversation claiming to be Alice; the signature
    // validator on the conversation channel refuses the block.
    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(test_node("Node", 1), &dir);
    let mallory = party_keypair(9);

    let (conversation_hash, conversation) = conversation_record("Alice", &mallory, "Hijack");
    let (message_hash, message) = message_record("Alice", &mallory, None, b"Foo");

    let err = store
        .new_conversation(conversation_hash, conversation, message_hash, message)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConveyError::Chain(convey_chain::ChainError::Rejected(_))
    ));

    // Nothing reached the chain.
    let err = store.get_conversation(&conversation_hash).await.unwrap_err();
    assert!(matches!(err, ConveyError::NoSuchConversation(_)));
}

#[tokio::test]
async fn test_chain_registration_roundtrip() {
    let node = test_node("Node", 1);
    node.add_channel(convey::signed_channel(
        convey::CONVEY_REGISTRATION,
        THRESHOLD_NONE,
        test_directory(),
    ));

    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(node, &dir);

    assert!(store.get_registration("Alice").await.unwrap().is_none());

    let alice = party_keypair(2);
    store
        .register_customer("Alice", &alice, "cus_1234")
        .await
        .unwrap();

    let registration = store.get_registration("Alice").await.unwrap().unwrap();
    assert_eq!(registration.customer, "Alice");
    assert_eq!(registration.merchant, "Node");
    assert_eq!(registration.customer_id, "cus_1234");

    assert!(store.get_registration("Bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_chain_register_alias_publishes_binding() {
    let node = test_node("Node", 1);
    let mut aliases = convey::signed_channel(convey::CONVEY_ALIAS, THRESHOLD_NONE, test_directory());
    aliases.add_validator(std::sync::Arc::new(convey::AliasValidator));
    node.add_channel(aliases);

    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(node.clone(), &dir);

    let alice = party_keypair(2);
    store.register_alias("Alice", &alice).await.unwrap();

    let aliases = node.channel(convey::CONVEY_ALIAS).unwrap();
    assert!(aliases.lock().await.head().is_some());
}

#[tokio::test]
async fn test_register_alias_without_channel_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = chain_store(test_node("Node", 1), &dir);

    let err = store
        .register_alias("Alice", &party_keypair(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ConveyError::NoSuchChannel(_)));
}
