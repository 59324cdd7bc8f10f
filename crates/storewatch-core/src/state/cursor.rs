// # Order Cursor
//
// "Last seen order" marker for the order poller.
//
// ## Invariant
//
// Once set, the cursor only moves forward: `advance()` rejects any key that
// is not strictly greater than the current one. It is never reset while the
// process runs and is not persisted, so after a restart it is initialized
// again from the latest existing row.

use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::CursorError;
use crate::traits::OrderId;

/// Immutable copy of the cursor for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CursorSnapshot {
    /// Key of the last accepted row
    pub last_seen: Option<OrderId>,
    /// Number of rows alerted since start
    pub orders_notified: u64,
}

/// Single-writer order cursor
#[derive(Debug, Default)]
pub struct OrderCursor {
    inner: RwLock<CursorSnapshot>,
}

impl OrderCursor {
    /// Create an unset cursor
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_seen(&self) -> Option<OrderId> {
        self.inner.read().await.last_seen
    }

    /// Set the starting point from an existing row without counting it
    ///
    /// Only valid while the cursor is unset; otherwise behaves like
    /// [`advance`](Self::advance) without counting a notification.
    pub(crate) async fn initialize(&self, key: OrderId) -> Result<(), CursorError> {
        let mut inner = self.inner.write().await;
        check_forward(inner.last_seen, key)?;
        inner.last_seen = Some(key);
        Ok(())
    }

    /// Move past an alerted row
    pub(crate) async fn advance(&self, key: OrderId) -> Result<(), CursorError> {
        let mut inner = self.inner.write().await;
        check_forward(inner.last_seen, key)?;
        inner.last_seen = Some(key);
        inner.orders_notified += 1;
        Ok(())
    }

    /// Copy the current cursor
    pub async fn snapshot(&self) -> CursorSnapshot {
        *self.inner.read().await
    }
}

fn check_forward(current: Option<OrderId>, proposed: OrderId) -> Result<(), CursorError> {
    match current {
        Some(current) if proposed <= current => {
            Err(CursorError::NotIncreasing { current, proposed })
        }
        _ => Ok(()),
    }
}
