//! Operation notifications
//!
//! The dispatcher emits one [`NotificationEvent`] per operation when the
//! request asks for it. Delivery is best effort and never fails the
//! operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Structured event describing a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub operation: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl NotificationEvent {
    pub fn new(operation: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: status.into(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sink for operation notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotificationEvent);
}

/// Discards every event
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &NotificationEvent) {}
}

/// Logs events through tracing
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) {
        info!(
            operation = %event.operation,
            status = %event.status,
            timestamp = %event.timestamp.to_rfc3339(),
            detail = ?event.detail,
            "Operation notification"
        );
    }
}

/// Forwards events to a channel, dropping them if the receiver lags
pub struct ChannelNotifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<NotificationEvent>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &NotificationEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(operation = %event.operation, error = %e, "Dropped notification");
        }
    }
}
