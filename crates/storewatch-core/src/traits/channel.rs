// # Notification Channel Trait
//
// Defines the interface for delivering an alert to one recipient.
//
// ## Implementations
//
// - Telegram Bot API: `storewatch-notify-telegram` crate
//
// Fan-out over many recipients, failure isolation and reporting are owned
// by the [`Notifier`](crate::notifier::Notifier); a channel only ever sees
// one recipient at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alert::Alert;
use crate::error::DeliveryError;

/// Opaque recipient identifier (a chat id for Telegram)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Trait for notification channel implementations
///
/// # Contract
///
/// - One call, one delivery attempt: no retries (the next scheduled alert
///   is the only retry vector)
/// - Formatting the alert (markup, truncation) is the channel's job
/// - Must not block other deliveries; all I/O is async
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `alert` to `recipient`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The channel accepted the message
    /// - `Err(DeliveryError)`: Classified delivery failure
    async fn send(&self, recipient: &RecipientId, alert: &Alert) -> Result<(), DeliveryError>;

    /// Channel name for logs
    fn channel_name(&self) -> &'static str;
}
