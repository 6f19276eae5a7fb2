//! Telegram side of the bot.
//!
//! Updates are turned into [`StepEvent`](crate::StepEvent)s, handed to the
//! [`Engine`](crate::Engine) and whatever comes back is rendered as an HTML
//! message with an inline keyboard. Nothing here knows about particular
//! flows except the main menu listing them.

use teloxide::prelude::*;
use teloxide::types::User;

use crate::conversation::ConversationId;
use crate::error::Error;

pub mod commands;
pub mod event;
pub mod handlers;
pub mod menu;
pub mod render;

pub use commands::Command;
pub use handlers::schema;

pub type HandlerResult = Result<(), Error>;

/// Conversations are per user per chat
pub fn conversation_id(chat_id: ChatId, user: &User) -> ConversationId {
    ConversationId::new(chat_id.0, user.id.0)
}
