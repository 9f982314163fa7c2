// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AMQP broker adapter backed by `lapin`.

use super::{BrokerAdapter, BrokerError};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::time::Duration;

/// Publishes to a single declared topic exchange with publisher confirms.
#[derive(Clone)]
pub struct AmqpBrokerAdapter {
    channel: Channel,
    exchange: String,
    confirm_timeout: Duration,
}

impl AmqpBrokerAdapter {
    pub async fn connect(
        uri: &str,
        exchange: &str,
        publisher_confirms: bool,
        confirm_timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::PublishFailed(format!("connect: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::PublishFailed(format!("create_channel: {e}")))?;

        if publisher_confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| BrokerError::PublishFailed(format!("confirm_select: {e}")))?;
        }

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::PublishFailed(format!("exchange_declare: {e}")))?;

        Ok(Self {
            channel,
            exchange: exchange.to_string(),
            confirm_timeout,
        })
    }
}

#[async_trait]
impl BrokerAdapter for AmqpBrokerAdapter {
    async fn publish(&self, routing_key: &str, payload: &serde_json::Value) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| BrokerError::PublishFailed(format!("serialize: {e}")))?;

        let publish = self.channel.basic_publish(
            &self.exchange,
            routing_key,
            BasicPublishOptions::default(),
            &body,
            BasicProperties::default().with_content_type("application/json".into()),
        );

        let confirmation = tokio::time::timeout(self.confirm_timeout, publish)
            .await
            .map_err(|_| BrokerError::ConfirmTimeout(self.confirm_timeout))?
            .map_err(|e| BrokerError::PublishFailed(e.to_string()))?;

        confirmation
            .await
            .map_err(|e| BrokerError::PublishFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "amqp_tests.rs"]
mod tests;
