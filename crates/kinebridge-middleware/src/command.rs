//! One-shot commands to the bus.
//!
//! Each call opens a fresh [`BridgeConnection`], sends a single operation and
//! closes it again.  No reply is awaited.

use kinebridge_types::{BridgeError, BusOp};
use serde_json::Value;
use tracing::info;

use crate::bridge::BridgeConnection;

/// Sends publish / call-service operations over short-lived connections.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    url: String,
}

impl CommandPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Publish `msg` on `topic`.
    pub async fn publish(&self, topic: &str, msg: Value) -> Result<(), BridgeError> {
        self.send_once(BusOp::publish(topic, msg)).await?;
        info!(url = %self.url, topic = %topic, "published to bus");
        Ok(())
    }

    /// Call `service` with `args`.
    pub async fn call_service(&self, service: &str, args: Value) -> Result<(), BridgeError> {
        self.send_once(BusOp::call_service(service, args)).await?;
        info!(url = %self.url, service = %service, "service call sent");
        Ok(())
    }

    async fn send_once(&self, op: BusOp) -> Result<(), BridgeError> {
        let mut conn = BridgeConnection::connect(&self.url).await?;
        let sent = conn.send(&op).await;
        conn.close().await?;
        sent
    }
}
