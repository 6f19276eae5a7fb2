//! Conversation engine and flows of the operator desk bot.
//!
//! A flow is a named graph of states. Every inbound update is turned into a
//! [`StepEvent`] and handed to [`Engine::dispatch`], which finds the
//! transition of the conversation's current state that accepts the event,
//! runs its handler and stores the result. Telegram is only one consumer
//! of the engine, see [`tg`].

pub mod error;
pub mod config;
pub mod conversation;
pub mod event;
pub mod context_store;
pub mod flow;
pub mod dispatch;
pub mod navigation;
pub mod role;
pub mod role_gate;
pub mod repository;
pub mod request;
pub mod audit;
pub mod catalog;
pub mod flows;
pub mod markup;
pub mod tg;

pub type DateTime = chrono::DateTime<chrono::Utc>;
pub type Offset = chrono::Utc;

pub use conversation::{Conversation, ConversationId, Scratch};
pub use dispatch::{Engine, Outcome};
pub use event::StepEvent;
pub use flow::FlowDefinition;
pub use role::Role;
