// # Memory Order Source
//
// In-memory implementation of OrderSource.
//
// ## Purpose
//
// Provides an order store that lives inside the process. Useful for
// testing, demos, and embedding the poller where orders are produced
// in-process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::SourceError;
use crate::traits::{OrderId, OrderRow, OrderSource};

/// In-memory order store
///
/// Rows are kept in key order. Clones share the same rows, so a test can
/// hand one clone to the poller and insert through another.
///
/// # Example
///
/// ```rust,no_run
/// use storewatch_core::state::MemoryOrderSource;
/// use storewatch_core::traits::{OrderRow, OrderSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = MemoryOrderSource::new();
///     source.insert(OrderRow::new(1, "Karim", 990.0)).await;
///
///     let latest = source.latest().await?;
///     assert_eq!(latest.map(|row| row.id.0), Some(1));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderSource {
    inner: Arc<RwLock<BTreeMap<OrderId, OrderRow>>>,
}

impl MemoryOrderSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row
    pub async fn insert(&self, row: OrderRow) {
        self.inner.write().await.insert(row.id, row);
    }

    /// Get the number of rows
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the source is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl OrderSource for MemoryOrderSource {
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError> {
        let guard = self.inner.read().await;
        Ok(guard.values().next_back().cloned())
    }

    async fn newer_than(&self, after: OrderId) -> Result<Vec<OrderRow>, SourceError> {
        let guard = self.inner.read().await;
        Ok(guard
            .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
