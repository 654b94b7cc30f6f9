//! In-memory driver

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::domain::mail::{
    config::TransportConfig,
    driver::{DeliveryResult, DriverError, TransportDriver},
    message::Message,
};

lazy_static! {
    static ref OUTBOX: Mutex<Vec<OutboxEntry>> = Mutex::new(Vec::new());
}

/// One mail recorded by the in-memory driver.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    /// The message as the composer handed it over
    pub message: Message,

    /// Identifier assigned to the dispatched message
    pub message_id: String,

    /// When the message was dispatched
    pub sent_at: DateTime<Utc>,
}

/// Built-in disposable test driver.
///
/// Records every dispatched message into a process-wide outbox instead of
/// delivering it, so tests and local development can inspect outgoing mail
/// without a mail account.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDriver;

#[async_trait]
impl TransportDriver for MemoryDriver {
    fn set_config(&mut self, _config: &TransportConfig) -> Result<(), DriverError> {
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<DeliveryResult, DriverError> {
        let entry = OutboxEntry {
            message: message.clone(),
            message_id: format!("<{}@memory>", Uuid::now_v7()),
            sent_at: Utc::now(),
        };

        let message_id = entry.message_id.clone();

        let mut outbox = OUTBOX.lock().expect("memory outbox lock poisoned");
        outbox.push(entry);

        debug!(%message_id, total = outbox.len(), "recorded mail in memory outbox");

        Ok(DeliveryResult {
            message_id: Some(message_id),
            payload: json!({ "stored": outbox.len() }),
        })
    }
}

/// Returns a snapshot of every mail recorded so far.
pub fn outbox() -> Vec<OutboxEntry> {
    OUTBOX.lock().expect("memory outbox lock poisoned").clone()
}

/// Discards every recorded mail.
pub fn clear() {
    OUTBOX.lock().expect("memory outbox lock poisoned").clear();
}
