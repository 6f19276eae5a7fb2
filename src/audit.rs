use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::conversation::ConversationId;
use crate::error::Error;
use crate::DateTime;

/// One successful transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub conversation: ConversationId,
    pub flow: String,
    pub from: String,
    /// Next state, or `completed` / `cancelled`
    pub to: String,
    /// Short description of the event, never the text the user typed
    pub event: String,
    pub at: DateTime,
}

/// Gets told about transitions after they happened.
///
/// The engine does not wait for the outcome to decide anything, errors are
/// only logged.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), Error>;
}

/// Writes entries to the log as json
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAudit;

#[async_trait]
impl AuditSink for LogAudit {
    async fn record(&self, entry: &AuditEntry) -> Result<(), Error> {
        let line = serde_json::to_string(entry)?;
        log::info!(target: "audit", "{line}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Offset;

    #[tokio::test]
    async fn test_log_audit_accepts_entries() {
        let entry = AuditEntry {
            conversation: ConversationId::new(5, 6),
            flow: "connection_order".into(),
            from: "region".into(),
            to: "type".into(),
            event: "selection \"region toshkent\"".into(),
            at: Offset::now(),
        };
        assert!(LogAudit.record(&entry).await.is_ok());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!("connection_order", json["flow"]);
    }
}
