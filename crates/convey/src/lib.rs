//! # Convey
//!
//! A decentralized, append-only, content-addressed conversation network
//! with a token-economy ledger over proof-of-work chains.
//!
//! Participants start conversations and post replies as signed records,
//! sealed into PoW blocks on per-topic chains. Tokens are minted by
//! mining periodic validation chains, spent and burned by posting, and
//! earned when a message attracts replies: each reply sends half of its
//! remaining cost one ancestor up the reply hierarchy.
//!
//! ## Key pieces
//!
//! - [`Node`] - identity, channels, mining
//! - [`ChainStore`] / [`MemoryStore`] - the [`MessageStore`] contract
//! - [`Ledger`] - per-alias accounting derived from chain contents
//! - [`get_digest_entries`] - top conversations by yield
//! - [`TransactionValidator`] - creator-equals-sender enforcement
//! - [`AliasValidator`] - self-certifying alias bindings; every channel
//!   constructor also registers signature checking over a key directory

pub mod alias;
pub mod channels;
pub mod chainstore;
pub mod digest;
pub mod error;
pub mod keystore;
pub mod ledger;
pub mod memorystore;
pub mod node;
pub mod store;
pub mod transaction;

pub use alias::AliasValidator;
pub use channels::{
    message_channel_name, open_alias_channel, open_century_channel, open_conversation_channel,
    open_day_channel, open_decade_channel, open_hour_channel, open_message_channel,
    open_registration_channel, open_transaction_channel, open_week_channel, open_year_channel,
    signed_channel, CONVEY_ALIAS, CONVEY_CENTURY, CONVEY_CONVERSATION, CONVEY_DAY, CONVEY_DECADE,
    CONVEY_HOUR, CONVEY_PREFIX, CONVEY_PREFIX_MESSAGE, CONVEY_REGISTRATION, CONVEY_TRANSACTION,
    CONVEY_WEEK, CONVEY_YEAR, PVC_CHANNELS,
};
pub use chainstore::ChainStore;
pub use digest::{get_digest_entries, DigestEntry, DIGEST_LIMIT};
pub use error::{ConveyError, Result};
pub use keystore::KeyStore;
pub use ledger::{
    Ledger, LedgerBook, CENTENNIALLY_PVC_REWARD, DAILY_PVC_REWARD, DECENNIALLY_PVC_REWARD,
    HOURLY_PVC_REWARD, WEEKLY_PVC_REWARD, YEARLY_PVC_REWARD,
};
pub use memorystore::MemoryStore;
pub use node::{timestamp, Node};
pub use store::{
    listing_from_entry, ConversationStore, Listing, MessageStore, MessageView, UserStore,
};
pub use transaction::TransactionValidator;
