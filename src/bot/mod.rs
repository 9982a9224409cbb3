/// Subscriber messaging.
///
/// The pipeline sends notifications and reads the command feed through the
/// [`Messenger`] trait; `telegram` holds the Bot API implementation.
/// Tests substitute an in-memory messenger that records sends.

use crate::model::{BotError, InboundMessage};

pub mod telegram;

/// Outbound sends plus the inbound update feed, as one collaborator.
pub trait Messenger {
    /// Delivers one text message to one chat.
    fn send(&self, chat_id: i64, text: &str) -> Result<(), BotError>;

    /// Fetches updates after the given cursor, flattened to the fields the
    /// ledger cares about, in delivery order. `None` fetches from the
    /// beginning of what the API still holds.
    fn fetch_updates(&self, after: Option<i64>) -> Result<Vec<InboundMessage>, BotError>;
}
