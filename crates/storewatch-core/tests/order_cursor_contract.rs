//! Contract Test: Order Cursor
//!
//! This test verifies the cursor-based order poller.
//!
//! Constraints verified:
//! - The first poll starts from the latest existing row and alerts nothing
//! - An empty store leaves the cursor unset and is retried
//! - Each new row gets exactly one alert, oldest first
//! - The cursor advances after each row, before the next one is alerted
//! - A source failure leaves the cursor untouched
//! - A panicking query is contained; the loop keeps polling
//!
//! If this test fails, orders may be alerted twice or never.

mod common;

use async_trait::async_trait;
use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storewatch_core::error::{DeliveryError, SourceError};
use storewatch_core::state::OrderCursor;
use storewatch_core::traits::{NotificationChannel, OrderId, OrderRow, OrderSource, RecipientId};
use storewatch_core::{Alert, Notifier, OrderPollConfig, OrderPoller, OrderPollerHandle, PollOutcome};

fn poller(source: &SwitchableSource, channel: &RecordingChannel) -> OrderPoller {
    OrderPoller::new(
        Arc::new(source.clone()),
        notifier(channel, &["admin"]),
        &OrderPollConfig::default(),
    )
    .expect("default config is valid")
}

fn alerted_ids(channel: &RecordingChannel) -> Vec<i64> {
    channel
        .sent_to("admin")
        .into_iter()
        .filter_map(|alert| match alert {
            Alert::NewOrder(row) => Some(row.id.0),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn initializes_from_latest_without_alerting() {
    let source = SwitchableSource::new();
    source.insert(1).await;
    source.insert(3).await;
    let channel = RecordingChannel::new();
    let poller = poller(&source, &channel);

    let outcome = poller.tick().await;

    assert_eq!(outcome, PollOutcome::Initialized(OrderId(3)));
    assert_eq!(poller.cursor().last_seen().await, Some(OrderId(3)));
    assert_eq!(poller.cursor().snapshot().await.orders_notified, 0);
    assert!(channel.sent().is_empty());
    assert_eq!(source.newer_than_calls(), 0);
}

#[tokio::test]
async fn empty_store_is_retried() {
    let source = SwitchableSource::new();
    let channel = RecordingChannel::new();
    let poller = poller(&source, &channel);

    assert_eq!(poller.tick().await, PollOutcome::AwaitingFirstOrder);
    assert_eq!(poller.tick().await, PollOutcome::AwaitingFirstOrder);
    assert_eq!(poller.cursor().last_seen().await, None);

    source.insert(5).await;
    assert_eq!(poller.tick().await, PollOutcome::Initialized(OrderId(5)));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn one_alert_per_new_row_in_order() {
    let source = SwitchableSource::new();
    source.insert(2).await;
    let channel = RecordingChannel::new();
    let poller = poller(&source, &channel);
    poller.tick().await;

    for id in [9, 5, 7] {
        source.insert(id).await;
    }

    let outcome = poller.tick().await;

    let PollOutcome::Delivered(reports) = outcome else {
        panic!("expected deliveries, got {:?}", outcome);
    };
    let keys: Vec<_> = reports.iter().map(|(id, _)| id.0).collect();
    assert_eq!(keys, vec![5, 7, 9]);
    assert!(reports.iter().all(|(_, report)| report.is_complete()));
    assert_eq!(alerted_ids(&channel), vec![5, 7, 9]);

    let snapshot = poller.cursor().snapshot().await;
    assert_eq!(snapshot.last_seen, Some(OrderId(9)));
    assert_eq!(snapshot.orders_notified, 3);

    // Nothing new: no further alerts.
    assert_eq!(poller.tick().await, PollOutcome::Delivered(Vec::new()));
    assert_eq!(alerted_ids(&channel).len(), 3);
}

/// Records where the cursor stood when each alert went out
struct CursorProbe {
    cursor: Mutex<Option<Arc<OrderCursor>>>,
    seen: Mutex<Vec<(i64, Option<i64>)>>,
}

#[async_trait]
impl NotificationChannel for CursorProbe {
    async fn send(&self, _recipient: &RecipientId, alert: &Alert) -> Result<(), DeliveryError> {
        let cursor = self.cursor.lock().unwrap().clone();
        let at = match cursor {
            Some(cursor) => cursor.last_seen().await.map(|id| id.0),
            None => None,
        };
        if let Alert::NewOrder(row) = alert {
            self.seen.lock().unwrap().push((row.id.0, at));
        }
        Ok(())
    }

    fn channel_name(&self) -> &'static str {
        "cursor-probe"
    }
}

#[tokio::test]
async fn cursor_moves_none_to_5_to_7_to_9() {
    let source = SwitchableSource::new();
    let channel = Arc::new(CursorProbe {
        cursor: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    let poller = OrderPoller::new(
        Arc::new(source.clone()),
        Notifier::new(channel.clone(), vec![RecipientId::from("admin")]),
        &OrderPollConfig::default(),
    )
    .unwrap();
    *channel.cursor.lock().unwrap() = Some(poller.cursor());

    assert_eq!(poller.cursor().last_seen().await, None);
    source.insert(5).await;
    poller.tick().await;
    assert_eq!(poller.cursor().last_seen().await, Some(OrderId(5)));

    source.insert(7).await;
    source.insert(9).await;
    poller.tick().await;

    assert_eq!(
        *channel.seen.lock().unwrap(),
        vec![(7, Some(5)), (9, Some(7))],
        "cursor must advance after each row, before the next alert"
    );
    assert_eq!(poller.cursor().last_seen().await, Some(OrderId(9)));
}

#[tokio::test]
async fn source_failure_leaves_cursor_alone() {
    let source = SwitchableSource::new();
    source.insert(10).await;
    let channel = RecordingChannel::new();
    let poller = poller(&source, &channel);
    poller.tick().await;

    source.insert(11).await;
    source.set_failing(true);

    let outcome = poller.tick().await;
    assert!(matches!(outcome, PollOutcome::SourceUnavailable(SourceError::Unavailable(_))));
    assert_eq!(poller.cursor().last_seen().await, Some(OrderId(10)));
    assert!(channel.sent().is_empty());

    source.set_failing(false);
    poller.tick().await;
    assert_eq!(alerted_ids(&channel), vec![11]);
    assert_eq!(poller.cursor().last_seen().await, Some(OrderId(11)));
}

#[tokio::test]
async fn failing_store_blocks_initialization() {
    let source = SwitchableSource::new();
    source.insert(4).await;
    source.set_failing(true);
    let channel = RecordingChannel::new();
    let poller = poller(&source, &channel);

    assert!(matches!(poller.tick().await, PollOutcome::SourceUnavailable(_)));
    assert_eq!(poller.cursor().last_seen().await, None);

    source.set_failing(false);
    assert_eq!(poller.tick().await, PollOutcome::Initialized(OrderId(4)));
}

/// A source that hands back stale rows alongside fresh ones
struct StaleSource {
    rows: Vec<OrderRow>,
}

#[async_trait]
impl OrderSource for StaleSource {
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError> {
        Ok(Some(OrderRow::new(6, "seed", 1.0)))
    }

    async fn newer_than(&self, _after: OrderId) -> Result<Vec<OrderRow>, SourceError> {
        Ok(self.rows.clone())
    }

    fn source_name(&self) -> &'static str {
        "stale"
    }
}

#[tokio::test]
async fn rows_at_or_behind_cursor_are_skipped() {
    let source = StaleSource {
        rows: vec![
            OrderRow::new(8, "fresh", 10.0),
            OrderRow::new(6, "repeat", 10.0),
            OrderRow::new(2, "stale", 10.0),
        ],
    };
    let channel = RecordingChannel::new();
    let poller = OrderPoller::new(
        Arc::new(source),
        notifier(&channel, &["admin"]),
        &OrderPollConfig::default(),
    )
    .unwrap();

    poller.tick().await;
    poller.tick().await;

    assert_eq!(alerted_ids(&channel), vec![8]);
    assert_eq!(poller.cursor().snapshot().await.orders_notified, 1);
}

/// A source that never answers
struct SilentSource;

#[async_trait]
impl OrderSource for SilentSource {
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError> {
        std::future::pending().await
    }

    async fn newer_than(&self, _after: OrderId) -> Result<Vec<OrderRow>, SourceError> {
        std::future::pending().await
    }

    fn source_name(&self) -> &'static str {
        "silent"
    }
}

#[tokio::test(start_paused = true)]
async fn hung_query_times_out() {
    let channel = RecordingChannel::new();
    let poller = OrderPoller::new(
        Arc::new(SilentSource),
        notifier(&channel, &["admin"]),
        &OrderPollConfig::default(),
    )
    .unwrap();

    assert_eq!(
        poller.tick().await,
        PollOutcome::SourceUnavailable(SourceError::Timeout)
    );
}

#[tokio::test(start_paused = true)]
async fn spawned_poller_waits_initial_delay_then_polls() {
    let source = SwitchableSource::new();
    source.insert(1).await;
    let channel = RecordingChannel::new();
    let handle = OrderPollerHandle::spawn(poller(&source, &channel));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(handle.snapshot().await.last_seen, None, "polled before the initial delay");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(handle.snapshot().await.last_seen, Some(OrderId(1)));

    source.insert(2).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.snapshot().await.last_seen, Some(OrderId(2)));
    assert_eq!(alerted_ids(&channel), vec![2]);

    assert!(handle.is_running());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_initial_delay() {
    let source = SwitchableSource::new();
    source.insert(1).await;
    let handle = OrderPollerHandle::spawn(poller(&source, &RecordingChannel::new()));

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.shutdown().await;

    assert_eq!(source.newer_than_calls(), 0);
}

/// A source whose first `latest()` call panics
#[derive(Clone, Default)]
struct PanicOnceSource {
    inner: SwitchableSource,
    latest_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OrderSource for PanicOnceSource {
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError> {
        if self.latest_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("driver decode bug");
        }
        self.inner.latest().await
    }

    async fn newer_than(&self, after: OrderId) -> Result<Vec<OrderRow>, SourceError> {
        self.inner.newer_than(after).await
    }

    fn source_name(&self) -> &'static str {
        "panic-once"
    }
}

#[tokio::test]
async fn panicking_query_is_reported_not_raised() {
    let source = PanicOnceSource::default();
    source.inner.insert(4).await;
    let channel = RecordingChannel::new();
    let poller = OrderPoller::new(
        Arc::new(source.clone()),
        notifier(&channel, &["admin"]),
        &OrderPollConfig::default(),
    )
    .unwrap();

    let outcome = poller.tick().await;
    assert!(matches!(
        outcome,
        PollOutcome::SourceUnavailable(SourceError::Unexpected(_))
    ));
    assert_eq!(poller.cursor().last_seen().await, None);

    assert_eq!(poller.tick().await, PollOutcome::Initialized(OrderId(4)));
}

#[tokio::test(start_paused = true)]
async fn spawned_poller_survives_panicking_query() {
    let source = PanicOnceSource::default();
    source.inner.insert(1).await;
    let channel = RecordingChannel::new();
    let handle = OrderPollerHandle::spawn(
        OrderPoller::new(
            Arc::new(source.clone()),
            notifier(&channel, &["admin"]),
            &OrderPollConfig::default(),
        )
        .unwrap(),
    );

    // First poll panics inside the source.
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(handle.is_running(), "poller died with its query");
    assert_eq!(handle.snapshot().await.last_seen, None);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.snapshot().await.last_seen, Some(OrderId(1)));

    source.inner.insert(2).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(alerted_ids(&channel), vec![2]);
    assert_eq!(source.latest_calls.load(Ordering::SeqCst), 2);

    handle.shutdown().await;
}
