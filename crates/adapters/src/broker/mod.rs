// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker adapters
//!
//! Publishes outbox entries to the downstream message broker. Confirmation
//! semantics are modeled directly as the `Result`: `Ok(())` means the broker
//! acked the publish, `Err` means the publisher should retry per spec.md §4.3.

mod amqp;

pub use amqp::AmqpBrokerAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBrokerAdapter, PublishCall};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("confirm timed out after {0:?}")]
    ConfirmTimeout(std::time::Duration),
}

/// Adapter for publishing domain events to the broker.
#[async_trait]
pub trait BrokerAdapter: Clone + Send + Sync + 'static {
    /// Publish `payload` on `routing_key`, waiting for a publisher confirm.
    async fn publish(&self, routing_key: &str, payload: &serde_json::Value) -> Result<(), BrokerError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
