//! # Convey Testkit
//!
//! Shared fixtures and proptest generators for the Convey test suites.
//! Not a public API; tests only.

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    conversation_record, conversation_record_at, message_record, mine_transaction,
    mine_yearly_pvc, party_keypair, test_directory, test_node, validating_test_node,
};
pub use generators::{record_from_params, RecordParams};
