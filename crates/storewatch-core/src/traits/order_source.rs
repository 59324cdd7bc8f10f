// # Order Source Trait
//
// Defines the two queries the order poller needs from the order store.
//
// ## Implementations
//
// - PostgreSQL: `storewatch-source-postgres` crate
// - In-memory: [`MemoryOrderSource`](crate::state::MemoryOrderSource)
//
// Both queries return an empty result rather than an error when nothing
// matches. Connection lifecycle is the implementation's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SourceError;

/// Ordered row key of an order (monotonically increasing identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One order row as seen by the poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    /// Row key
    pub id: OrderId,
    /// Customer display name
    pub customer_name: String,
    /// Order total
    pub total_price: f64,
    /// Fulfilment status, if recorded
    pub status: Option<String>,
    /// Creation time, if recorded
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    /// Create a row with only the required columns
    pub fn new(id: impl Into<OrderId>, customer_name: impl Into<String>, total_price: f64) -> Self {
        Self {
            id: id.into(),
            customer_name: customer_name.into(),
            total_price,
            status: None,
            created_at: None,
        }
    }

    /// Set the fulfilment status
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Trait for order store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// The single most recent row, or `None` when the store is empty
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError>;

    /// All rows with a key greater than `after`, oldest first
    async fn newer_than(&self, after: OrderId) -> Result<Vec<OrderRow>, SourceError>;

    /// Source name for logs
    fn source_name(&self) -> &'static str;
}
