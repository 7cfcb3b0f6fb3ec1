//! Well-known channel names and constructors.
//!
//! All Convey chains share the `Convey-` prefix. Six periodic validation
//! chains mint tokens; the content chains carry conversations, messages,
//! transactions, and registrations. Per-conversation message chains embed
//! the conversation record hash in unpadded base64url.
//!
//! Every constructor registers a [`SignatureValidator`] over the caller's
//! key directory, so a block claiming a bound alias without its signature
//! never advances a head. The alias chain additionally requires
//! self-certifying bindings, and the transaction chain its
//! creator-equals-sender rule.

use std::sync::Arc;

use convey_chain::{
    Channel, KeyDirectory, SignatureValidator, THRESHOLD_G, THRESHOLD_PERIOD_CENTURY,
    THRESHOLD_PERIOD_DAY, THRESHOLD_PERIOD_DECADE, THRESHOLD_PERIOD_HOUR, THRESHOLD_PERIOD_WEEK,
    THRESHOLD_PERIOD_YEAR,
};
use convey_core::RecordHash;

use crate::alias::AliasValidator;
use crate::transaction::TransactionValidator;

pub const CONVEY_HOUR: &str = "Convey-Hour";
pub const CONVEY_DAY: &str = "Convey-Day";
pub const CONVEY_WEEK: &str = "Convey-Week";
pub const CONVEY_YEAR: &str = "Convey-Year";
pub const CONVEY_DECADE: &str = "Convey-Decade";
pub const CONVEY_CENTURY: &str = "Convey-Century";
pub const CONVEY_ALIAS: &str = "Convey-Alias";
pub const CONVEY_CONVERSATION: &str = "Convey-Conversation";
pub const CONVEY_TRANSACTION: &str = "Convey-Transaction";
pub const CONVEY_REGISTRATION: &str = "Convey-Registration";
pub const CONVEY_PREFIX: &str = "Convey-";
pub const CONVEY_PREFIX_MESSAGE: &str = "Convey-Message-";

/// The six periodic validation chains, hour through century.
pub const PVC_CHANNELS: [&str; 6] = [
    CONVEY_HOUR,
    CONVEY_DAY,
    CONVEY_WEEK,
    CONVEY_YEAR,
    CONVEY_DECADE,
    CONVEY_CENTURY,
];

/// The message-chain name for a conversation.
pub fn message_channel_name(conversation: &RecordHash) -> String {
    format!("{CONVEY_PREFIX_MESSAGE}{}", conversation.to_base64())
}

/// A channel with the signature validator attached.
pub fn signed_channel(
    name: impl Into<String>,
    threshold: u32,
    directory: Arc<dyn KeyDirectory>,
) -> Channel {
    let mut channel = Channel::new(name, threshold);
    channel.add_validator(Arc::new(SignatureValidator::new(directory)));
    channel
}

pub fn open_hour_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_HOUR, THRESHOLD_PERIOD_HOUR, directory)
}

pub fn open_day_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_DAY, THRESHOLD_PERIOD_DAY, directory)
}

pub fn open_week_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_WEEK, THRESHOLD_PERIOD_WEEK, directory)
}

pub fn open_year_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_YEAR, THRESHOLD_PERIOD_YEAR, directory)
}

pub fn open_decade_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_DECADE, THRESHOLD_PERIOD_DECADE, directory)
}

pub fn open_century_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_CENTURY, THRESHOLD_PERIOD_CENTURY, directory)
}

/// The alias chain also requires every binding to certify itself.
pub fn open_alias_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    let mut channel = signed_channel(CONVEY_ALIAS, THRESHOLD_G, directory);
    channel.add_validator(Arc::new(AliasValidator));
    channel
}

pub fn open_conversation_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_CONVERSATION, THRESHOLD_G, directory)
}

/// The transaction chain also carries its creator-equals-sender rule.
pub fn open_transaction_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    let mut channel = signed_channel(CONVEY_TRANSACTION, THRESHOLD_G, directory);
    channel.add_validator(Arc::new(TransactionValidator));
    channel
}

pub fn open_registration_channel(directory: Arc<dyn KeyDirectory>) -> Channel {
    signed_channel(CONVEY_REGISTRATION, THRESHOLD_G, directory)
}

pub fn open_message_channel(
    conversation: &RecordHash,
    directory: Arc<dyn KeyDirectory>,
) -> Channel {
    signed_channel(message_channel_name(conversation), THRESHOLD_G, directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convey_chain::MemoryKeyDirectory;

    fn directory() -> Arc<dyn KeyDirectory> {
        Arc::new(MemoryKeyDirectory::new())
    }

    #[test]
    fn test_message_channel_name_embeds_base64url() {
        let hash = RecordHash::from_bytes([0xfb; 32]);
        let name = message_channel_name(&hash);
        assert!(name.starts_with(CONVEY_PREFIX_MESSAGE));
        assert!(name.ends_with(&hash.to_base64()));
        assert!(!name.contains('='));
    }

    #[test]
    fn test_channel_constructors_use_registered_names() {
        assert_eq!(open_hour_channel(directory()).name(), CONVEY_HOUR);
        assert_eq!(
            open_conversation_channel(directory()).name(),
            CONVEY_CONVERSATION
        );
        assert_eq!(
            open_transaction_channel(directory()).name(),
            CONVEY_TRANSACTION
        );
        assert_eq!(
            open_registration_channel(directory()).name(),
            CONVEY_REGISTRATION
        );
        assert_eq!(open_alias_channel(directory()).name(), CONVEY_ALIAS);
    }

    #[test]
    fn test_all_names_share_prefix() {
        for name in PVC_CHANNELS {
            assert!(name.starts_with(CONVEY_PREFIX));
        }
    }
}
