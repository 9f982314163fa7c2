// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification adapters

mod desktop;
mod noop;

pub use desktop::DesktopNotifyAdapter;
pub use noop::NoOpNotifyAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Presentation-only priority metadata for a notification (spec.md §4.7).
/// Carries no delivery semantics — a `min` notification is sent exactly
/// the same way as an `urgent` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPriority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Urgent,
}

impl NotifyPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyPriority::Min => "min",
            NotifyPriority::Low => "low",
            NotifyPriority::Default => "default",
            NotifyPriority::High => "high",
            NotifyPriority::Urgent => "urgent",
        }
    }
}

/// Adapter for sending notifications
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Send a notification with a title, message body, and priority
    async fn notify(&self, title: &str, message: &str, priority: NotifyPriority) -> Result<(), NotifyError>;
}
