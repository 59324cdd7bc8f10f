//! Order poller loop
//!
//! The [`OrderPoller`] is the cursor-based sibling of the website monitor.
//! Instead of probing, each iteration asks the [`OrderSource`] for rows
//! newer than the cursor and alerts once per row.
//!
//! ## Event Flow
//!
//! 1. Cursor unset: look up the latest existing row and start from there
//!    (that row is not alerted). Empty store: stay unset, retry next time.
//! 2. Cursor set: fetch rows with a greater key, oldest first
//! 3. For each row: notify, then advance the cursor to its key
//! 4. Source failure: log, leave the cursor alone, retry next interval
//!
//! Each query runs in its own task, so a source that panics is reported as
//! [`SourceError::Unexpected`] and the loop carries on.
//!
//! Advancing after each row means a crash mid-batch loses at most the rows
//! already alerted. The cursor lives in memory only: after a restart it is
//! re-initialized from the latest row, so orders that arrived while the
//! process was down are not alerted.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::config::OrderPollConfig;
use crate::error::{Result, SourceError};
use crate::notifier::{DeliveryReport, Notifier};
use crate::state::{CursorSnapshot, OrderCursor};
use crate::traits::{OrderId, OrderRow, OrderSource};

/// What one poll did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The store is empty; the cursor is still unset
    AwaitingFirstOrder,

    /// The cursor was set from the latest existing row
    Initialized(OrderId),

    /// New rows were alerted, in order (possibly none)
    Delivered(Vec<(OrderId, DeliveryReport)>),

    /// The source could not be queried; nothing changed
    SourceUnavailable(SourceError),
}

/// Order poller
///
/// Owns the data source, the notifier and the cursor. The cursor has a
/// single writer: this poller.
pub struct OrderPoller {
    source: Arc<dyn OrderSource>,
    notifier: Notifier,
    cursor: Arc<OrderCursor>,
    interval: Duration,
    initial_delay: Duration,
    query_timeout: Duration,
}

impl OrderPoller {
    /// Create an order poller from configuration
    pub fn new(source: Arc<dyn OrderSource>, notifier: Notifier, config: &OrderPollConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            notifier,
            cursor: Arc::new(OrderCursor::new()),
            interval: config.interval(),
            initial_delay: config.initial_delay(),
            query_timeout: config.query_timeout(),
        })
    }

    /// Shared cursor (read through `snapshot()`)
    pub fn cursor(&self) -> Arc<OrderCursor> {
        Arc::clone(&self.cursor)
    }

    /// Run exactly one poll
    ///
    /// Does not sleep, so tests can step the poller by hand.
    pub async fn tick(&self) -> PollOutcome {
        let Some(last_seen) = self.cursor.last_seen().await else {
            return self.initialize().await;
        };

        let newer = self
            .query(move |source| async move { source.newer_than(last_seen).await })
            .await;

        let mut rows = match newer {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error polling orders from {}: {}", self.source.source_name(), e);
                return PollOutcome::SourceUnavailable(e);
            }
        };

        rows.sort_by_key(|row| row.id);
        if !rows.is_empty() {
            info!("{} new order(s) since #{}", rows.len(), last_seen);
        }

        let mut delivered = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(report) = self.deliver_row(row).await {
                delivered.push(report);
            }
        }

        PollOutcome::Delivered(delivered)
    }

    async fn initialize(&self) -> PollOutcome {
        match self.query(|source| async move { source.latest().await }).await {
            Ok(Some(row)) => match self.cursor.initialize(row.id).await {
                Ok(()) => {
                    info!("Initialized order tracking at ID: {}", row.id);
                    PollOutcome::Initialized(row.id)
                }
                Err(e) => {
                    warn!("Could not initialize order cursor: {}", e);
                    PollOutcome::Delivered(Vec::new())
                }
            },
            Ok(None) => {
                debug!("No orders yet; order tracking not initialized");
                PollOutcome::AwaitingFirstOrder
            }
            Err(e) => {
                error!("Failed to initialize order tracking: {}", e);
                PollOutcome::SourceUnavailable(e)
            }
        }
    }

    /// Alert one row, then move the cursor past it
    async fn deliver_row(&self, row: OrderRow) -> Option<(OrderId, DeliveryReport)> {
        let id = row.id;

        if let Some(current) = self.cursor.last_seen().await
            && id <= current
        {
            warn!("Skipping order #{} at or behind cursor #{}", id, current);
            return None;
        }

        let report = self.notifier.notify(&Alert::NewOrder(row)).await;

        if let Err(e) = self.cursor.advance(id).await {
            warn!("Order cursor not advanced: {}", e);
        }

        Some((id, report))
    }

    /// Run one source query in a separate task, bounded by the query timeout
    async fn query<T, F, Fut>(&self, op: F) -> std::result::Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn OrderSource>) -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>> + Send + 'static,
    {
        let mut task = tokio::spawn(op(Arc::clone(&self.source)));

        match tokio::time::timeout(self.query_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!(
                    "Query against {} failed unexpectedly: {}",
                    self.source.source_name(),
                    join_error
                );
                Err(SourceError::unexpected(format!("query task failed: {join_error}")))
            }
            Err(_) => {
                task.abort();
                Err(SourceError::Timeout)
            }
        }
    }

    /// Loop body; runs until `shutdown` fires or its sender is dropped
    async fn run(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) {
        info!(
            "Order polling task started (source={}, interval={:?})",
            self.source.source_name(),
            self.interval
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = &mut shutdown => {
                info!("Order polling stopped before first poll");
                return;
            }
        }

        loop {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Order polling stopped");
    }
}

/// Running order poller
pub struct OrderPollerHandle {
    cursor: Arc<OrderCursor>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl OrderPollerHandle {
    /// Spawn the poller as its own task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(poller: OrderPoller) -> Self {
        let (tx, rx) = oneshot::channel();
        let poller = Arc::new(poller);
        let cursor = poller.cursor();
        let task = tokio::spawn(poller.run(rx));

        Self {
            cursor,
            shutdown: Some(tx),
            task,
        }
    }

    /// Copy of the current cursor
    pub async fn snapshot(&self) -> CursorSnapshot {
        self.cursor.snapshot().await
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop after the current iteration and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Err(e) = self.task.await {
            error!("Order polling task ended abnormally: {}", e);
        }
    }
}
