#![cfg(feature = "redis_db")]

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::context_store::ContextStore;
use crate::conversation::{Conversation, ConversationId};
use crate::error::Error;
use crate::DateTime;

/// Structure:
///   desk_conv:{chat}:{user}   SerializedData (Conversation as json)
///   desk_conv_activity        SortedSet<ConversationId> scored by
///                             last activity, unix seconds
#[derive(Clone)]
pub struct RedisContextStore {
    c: ConnectionManager,
}

impl RedisContextStore {
    pub async fn new(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let c = client.get_tokio_connection_manager().await?;
        Ok(RedisContextStore { c })
    }
}

#[async_trait]
impl ContextStore for RedisContextStore {
    async fn load(&self, id: ConversationId) -> Result<Option<Conversation>, Error> {
        log::debug!("load {id}");
        let mut c = self.c.clone();
        let data: Option<Vec<u8>> = redis::Cmd::get(conv_key(id))
            .query_async(&mut c).await?;
        match data {
            Some(data) if !data.is_empty() => Ok(Some(serde_json::from_slice(&data)?)),
            _ => Ok(None),
        }
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), Error> {
        let id = conversation.id;
        log::debug!("save {id} {:?}", conversation.phase);
        let data = serde_json::to_vec(conversation)?;
        let mut c = self.c.clone();
        redis::pipe()
            .atomic()
            .set(conv_key(id), data)
            .zadd(ACTIVITY_KEY, id.to_string(),
                  conversation.last_activity_at.timestamp())
            .query_async::<_, ()>(&mut c).await?;
        Ok(())
    }

    async fn clear(&self, id: ConversationId) -> Result<(), Error> {
        log::debug!("clear {id}");
        let mut c = self.c.clone();
        redis::pipe()
            .atomic()
            .del(conv_key(id))
            .zrem(ACTIVITY_KEY, id.to_string())
            .query_async::<_, ()>(&mut c).await?;
        Ok(())
    }

    async fn idle_since(&self, cutoff: DateTime) -> Result<Vec<ConversationId>, Error> {
        let mut c = self.c.clone();
        // "(" makes the upper bound exclusive
        let max = format!("({}", cutoff.timestamp());
        let members: Vec<String> =
            redis::Cmd::zrangebyscore(ACTIVITY_KEY, "-inf", max)
            .query_async(&mut c).await?;

        let mut ids = Vec::with_capacity(members.len());
        for m in members.iter() {
            match m.parse() {
                Ok(id) => ids.push(id),
                Err(e) => log::warn!("idle_since skipping weird member {m}: {e}"),
            }
        }
        Ok(ids)
    }
}

const PREFIX: &str = "desk";

const ACTIVITY_KEY: &str = "desk_conv_activity";

fn conv_key(id: ConversationId) -> String {
    format!("{PREFIX}_conv:{id}")
}
