use async_trait::async_trait;

use crate::conversation::{Conversation, ConversationId, Scratch};
use crate::error::Error;
use crate::DateTime;

mod mem;
pub use mem::MemContextStore;

#[cfg(feature = "redis_db")]
mod redis_db;
#[cfg(feature = "redis_db")]
pub use redis_db::RedisContextStore;

/// Where conversations live between events.
///
/// An unknown id is an empty context, not an error: the first event of any
/// flow must work without anything being provisioned.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn load(&self, id: ConversationId) -> Result<Option<Conversation>, Error>;

    /// Replaces the whole conversation record
    async fn save(&self, conversation: &Conversation) -> Result<(), Error>;

    async fn clear(&self, id: ConversationId) -> Result<(), Error>;

    /// Conversations with no activity since `cutoff`, for the idle reaper
    async fn idle_since(&self, cutoff: DateTime) -> Result<Vec<ConversationId>, Error>;

    /// Scratch of the conversation or an empty one
    async fn get(&self, id: ConversationId) -> Result<Scratch, Error> {
        Ok(self.load(id).await?
            .map(|conv| conv.scratch)
            .unwrap_or_default())
    }

    /// Shallow-merges `partial` into the scratch, last write wins per key.
    ///
    /// Not atomic with respect to other writers of the same id, the engine
    /// holds a per-conversation lock around its own load/save.
    async fn merge(&self, id: ConversationId, partial: Scratch) -> Result<(), Error> {
        let mut conv = self.load(id).await?
            .unwrap_or_else(|| Conversation::blank(id));
        conv.merge(partial);
        self.save(&conv).await
    }
}

