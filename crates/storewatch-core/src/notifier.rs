//! Fan-out delivery
//!
//! The [`Notifier`] sends one alert to every configured recipient. Each
//! delivery runs as its own task so that a channel which errors or panics
//! for one recipient cannot stop delivery to the others. Results are
//! collected into a [`DeliveryReport`]; no aggregate error is ever raised.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::error::DeliveryError;
use crate::traits::{NotificationChannel, RecipientId};

/// Result of delivering to one recipient
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient: RecipientId,
    pub result: Result<(), DeliveryError>,
}

/// Per-recipient outcome of one `notify` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    deliveries: Vec<Delivery>,
}

impl DeliveryReport {
    /// All deliveries, in attempt order
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Recipients that accepted the alert
    pub fn succeeded(&self) -> Vec<&RecipientId> {
        self.deliveries
            .iter()
            .filter(|d| d.result.is_ok())
            .map(|d| &d.recipient)
            .collect()
    }

    /// Recipients that did not, with the reason
    pub fn failed(&self) -> Vec<(&RecipientId, &DeliveryError)> {
        self.deliveries
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (&d.recipient, e)))
            .collect()
    }

    /// Result for a given recipient, if it was attempted
    pub fn result_for(&self, recipient: &RecipientId) -> Option<&Result<(), DeliveryError>> {
        self.deliveries
            .iter()
            .find(|d| &d.recipient == recipient)
            .map(|d| &d.result)
    }

    /// Whether every recipient accepted the alert
    pub fn is_complete(&self) -> bool {
        self.deliveries.iter().all(|d| d.result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

/// Delivers alerts to a fixed recipient list
///
/// Cheap to clone; the channel and the recipient list are shared.
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    recipients: Arc<[RecipientId]>,
}

impl Notifier {
    /// Create a notifier
    ///
    /// # Parameters
    ///
    /// - `channel`: Channel used for every delivery
    /// - `recipients`: Fixed recipient list, read-only from here on
    pub fn new(channel: Arc<dyn NotificationChannel>, recipients: Vec<RecipientId>) -> Self {
        if recipients.is_empty() {
            warn!("Notifier created with no recipients; alerts will only be logged");
        }

        Self {
            channel,
            recipients: recipients.into(),
        }
    }

    pub fn recipients(&self) -> &[RecipientId] {
        &self.recipients
    }

    /// Deliver `alert` to every recipient
    ///
    /// Deliveries are attempted one after another. A failure for one
    /// recipient is logged and recorded, then the next recipient is tried.
    pub async fn notify(&self, alert: &Alert) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let alert = Arc::new(alert.clone());

        for recipient in self.recipients.iter() {
            let result = self.deliver_one(recipient, &alert).await;

            match &result {
                Ok(()) => {
                    debug!("Alert {} sent to {} via {}", alert.kind(), recipient, self.channel.channel_name());
                }
                Err(e) => {
                    warn!("Failed to notify {} of {}: {}", recipient, alert.kind(), e);
                }
            }

            report.deliveries.push(Delivery {
                recipient: recipient.clone(),
                result,
            });
        }

        if !report.is_empty() {
            info!(
                "Alert {} delivered to {}/{} recipient(s)",
                alert.kind(),
                report.succeeded().len(),
                report.len()
            );
        }

        report
    }

    async fn deliver_one(&self, recipient: &RecipientId, alert: &Arc<Alert>) -> Result<(), DeliveryError> {
        let channel = Arc::clone(&self.channel);
        let recipient = recipient.clone();
        let alert = Arc::clone(alert);

        match tokio::spawn(async move { channel.send(&recipient, &alert).await }).await {
            Ok(result) => result,
            Err(join_error) => Err(DeliveryError::Aborted(join_error.to_string())),
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("channel", &self.channel.channel_name())
            .field("recipients", &self.recipients)
            .finish()
    }
}
