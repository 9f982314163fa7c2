// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake broker adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BrokerAdapter, BrokerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PublishCall {
    pub routing_key: String,
    pub payload: serde_json::Value,
}

struct FakeBrokerState {
    calls: Vec<PublishCall>,
    fail_next: bool,
}

/// Fake broker adapter for testing the outbox publisher without a live AMQP server.
#[derive(Clone)]
pub struct FakeBrokerAdapter {
    inner: Arc<Mutex<FakeBrokerState>>,
}

impl Default for FakeBrokerAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBrokerState {
                calls: Vec::new(),
                fail_next: false,
            })),
        }
    }
}

impl FakeBrokerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.inner.lock().calls.clone()
    }

    pub fn fail_next_publish(&self) {
        self.inner.lock().fail_next = true;
    }
}

#[async_trait]
impl BrokerAdapter for FakeBrokerAdapter {
    async fn publish(&self, routing_key: &str, payload: &serde_json::Value) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(BrokerError::PublishFailed("simulated publish failure".into()));
        }
        inner.calls.push(PublishCall {
            routing_key: routing_key.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
