//! Notification hand-off.
//!
//! The engine only decides that a message should go out, to whom, and with
//! which template and context. Rendering and delivery belong to the
//! [`Notifier`] adapter. Notifications are handed over only after the unit
//! of work that produced them has committed.

use crate::core::EntityRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// The entity the message is about
    pub subject: EntityRef,
    pub recipients: Vec<u64>,
    pub template: String,
    pub context: Value,
}

/// Delivery adapter.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification);
}

/// Drops every notification. Used when no adapter is configured.
#[derive(Debug, Default)]
pub struct DiscardNotifier;

impl Notifier for DiscardNotifier {
    fn send(&self, notification: &Notification) {
        tracing::debug!(
            template = %notification.template,
            subject = %notification.subject,
            "no notifier configured, dropping notification"
        );
    }
}

/// Keeps every notification in memory, in hand-off order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn templates(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.template).collect()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notification: &Notification) {
        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sent.push(notification.clone());
    }
}
