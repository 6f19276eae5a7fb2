use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::context_store::ContextStore;
use crate::conversation::{Conversation, ConversationId, Scratch};
use crate::error::Error;
use crate::DateTime;

/// Conversations kept in process memory
#[derive(Clone, Default)]
pub struct MemContextStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl MemContextStore {
    pub fn new() -> MemContextStore {
        MemContextStore::default()
    }

    pub fn len(&self) -> Result<usize, Error> {
        let convs = self.conversations.read()
            .map_err(|e| format!("Rlock: {e:?}"))?;
        Ok(convs.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl ContextStore for MemContextStore {
    async fn load(&self, id: ConversationId) -> Result<Option<Conversation>, Error> {
        let convs = self.conversations.read()
            .map_err(|e| format!("Rlock: {e:?}"))?;
        Ok(convs.get(&id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), Error> {
        log::debug!("-> save {} {:?}", conversation.id, conversation.phase);
        let mut convs = self.conversations.write()
            .map_err(|e| format!("lock: {e:?}"))?;
        convs.insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn clear(&self, id: ConversationId) -> Result<(), Error> {
        log::debug!("-> clear {id}");
        let mut convs = self.conversations.write()
            .map_err(|e| format!("lock: {e:?}"))?;
        convs.remove(&id);
        Ok(())
    }

    async fn idle_since(&self, cutoff: DateTime) -> Result<Vec<ConversationId>, Error> {
        let convs = self.conversations.read()
            .map_err(|e| format!("Rlock: {e:?}"))?;
        Ok(convs.values()
            .filter(|c| c.last_activity_at < cutoff)
            .map(|c| c.id)
            .collect())
    }

    async fn merge(&self, id: ConversationId, partial: Scratch) -> Result<(), Error> {
        let mut convs = self.conversations.write()
            .map_err(|e| format!("lock: {e:?}"))?;
        convs.entry(id)
            .or_insert_with(|| Conversation::blank(id))
            .merge(partial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Offset;
    use chrono::Duration;
    use serde_json::json;

    fn scratch(key: &str, value: &str) -> Scratch {
        let mut s = Scratch::new();
        s.insert(key.to_string(), json!(value));
        s
    }

    #[tokio::test]
    async fn test_unknown_id_is_empty_context() {
        let store = MemContextStore::new();
        let id = ConversationId::new(7, 7);
        assert_eq!(Scratch::new(), store.get(id).await.unwrap());
        assert_eq!(None, store.load(id).await.unwrap());
        store.clear(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_merge_without_conversation_creates_one() {
        let store = MemContextStore::new();
        let id = ConversationId::new(1, 2);
        store.merge(id, scratch("region", "toshkent")).await.unwrap();
        store.merge(id, scratch("region", "samarqand")).await.unwrap();
        store.merge(id, scratch("type", "b2c")).await.unwrap();

        let got = store.get(id).await.unwrap();
        assert_eq!(Some(&json!("samarqand")), got.get("region"));
        assert_eq!(Some(&json!("b2c")), got.get("type"));
        assert_eq!(1, store.len().unwrap());

        store.clear(id).await.unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_merge_touches_activity() {
        let store = MemContextStore::new();
        let id = ConversationId::new(1, 2);
        let mut conv = Conversation::start(id, "f", "a");
        conv.last_activity_at = Offset::now() - Duration::hours(2);
        store.save(&conv).await.unwrap();

        let cutoff = Offset::now() - Duration::hours(1);
        assert_eq!(vec![id], store.idle_since(cutoff).await.unwrap());

        store.merge(id, scratch("k", "v")).await.unwrap();
        assert!(store.idle_since(cutoff).await.unwrap().is_empty());
    }
}
