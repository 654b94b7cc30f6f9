//! Transport driver capability

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::mock;

use crate::domain::mail::{config::TransportConfig, message::Message};

/// Errors raised by a transport driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver rejected its configuration
    #[error("invalid driver configuration: {0}")]
    Config(String),

    /// The message could not be assembled for this transport
    #[error("invalid message: {0}")]
    Message(String),

    /// Delivery failed; carries the transport's own error payload
    #[error(transparent)]
    Delivery(anyhow::Error),
}

/// The outcome of a successful delivery.
#[derive(Debug, Clone, Default)]
pub struct DeliveryResult {
    /// Identifier assigned to the dispatched message, if the transport
    /// produced one
    pub message_id: Option<String>,

    /// Driver-specific result payload
    pub payload: serde_json::Value,
}

/// A pluggable transport performing the actual delivery of a composed
/// message.
///
/// Drivers are instantiated by the
/// [`DriverRegistry`](crate::infrastructure::drivers::DriverRegistry) in two
/// steps: bare construction through the registered factory, then exactly one
/// `set_config` call before any `send`. The split lets a driver validate and
/// transform its configuration (for instance build a transport client)
/// separately from allocation.
#[async_trait]
pub trait TransportDriver: Send + Sync {
    /// Applies the transport settings from the active connection.
    ///
    /// Called exactly once, immediately after construction.
    fn set_config(&mut self, config: &TransportConfig) -> Result<(), DriverError>;

    /// Delivers the composed message.
    ///
    /// A single best-effort attempt: no retry, no queueing. Failures carry
    /// the transport's own error payload.
    async fn send(&self, message: &Message) -> Result<DeliveryResult, DriverError>;
}

#[cfg(test)]
mock! {
    pub TransportDriver {}

    #[async_trait]
    impl TransportDriver for TransportDriver {
        fn set_config(&mut self, config: &TransportConfig) -> Result<(), DriverError>;
        async fn send(&self, message: &Message) -> Result<DeliveryResult, DriverError>;
    }
}
