use std::fmt::Debug;

use async_trait::async_trait;

/// Notifications emitted by the revocation manager for interested
/// subscribers (protocol handlers, webhooks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationEvent {
    RevocationPublished {
        rev_reg_id: String,
        cred_rev_ids: Vec<String>,
    },
    PendingCleared {
        rev_reg_id: String,
    },
}

#[async_trait]
pub trait EventSink: Debug + Send + Sync {
    async fn emit(&self, event: RevocationEvent);
}

/// Default sink: events only hit the log.
#[derive(Debug, Default)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn emit(&self, event: RevocationEvent) {
        info!("revocation event: {:?}", event);
    }
}
