// # Monitor State
//
// Record of what the website monitor has observed.
//
// ## Writers
//
// | field | writer |
// |---|---|
// | `enabled` | the dashboard toggle (`MonitorHandle::enable/disable`) |
// | everything else | the running `WebsiteMonitor` loop only |
//
// The enable flag is an atomic so the loop can test it without touching the
// lock. All other fields live behind a `tokio::sync::RwLock` and are only
// ever read through `snapshot()`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::probe::{ProbeOutcome, Status};
use crate::tracker::TransitionKind;

/// Immutable copy of the monitor state for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Whether the monitor loop is meant to be running
    pub enabled: bool,
    /// Time of the most recent completed check
    pub last_check: Option<DateTime<Utc>>,
    /// Status of the most recent check; `None` before the first one
    pub last_status: Option<Status>,
    /// Error of the most recent check, if it failed
    pub last_error: Option<String>,
    /// Status code of the most recent check, if it got a response
    pub last_code: Option<u16>,
    /// Latency of the most recent check, if it got a response
    pub last_latency: Option<Duration>,
    /// Number of transitions into `Down`
    pub downtime_count: u64,
    /// Number of completed checks
    pub checks_total: u64,
}

#[derive(Debug, Default)]
struct Observed {
    last_check: Option<DateTime<Utc>>,
    last_status: Option<Status>,
    last_error: Option<String>,
    last_code: Option<u16>,
    last_latency: Option<Duration>,
    downtime_count: u64,
    checks_total: u64,
}

/// Monitoring state for one resource
///
/// Created once with monitoring disabled and no observations.
#[derive(Debug, Default)]
pub struct MonitorState {
    enabled: AtomicBool,
    generation: AtomicU64,
    observed: RwLock<Observed>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the loop should keep running
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn monitoring on; returns the new run generation, or `None` when
    /// it was already on
    pub(crate) fn enable(&self) -> Option<u64> {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Turn monitoring off; returns whether it was on
    pub(crate) fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::SeqCst)
    }

    /// Whether a loop started at `generation` should keep going
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.is_enabled() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Last recorded status
    pub async fn last_status(&self) -> Option<Status> {
        self.observed.read().await.last_status
    }

    /// Record a completed check
    ///
    /// `downtime_count` grows by one exactly when `transition` is
    /// `BecameDown`. Everything else is overwritten unconditionally.
    pub(crate) async fn record(&self, outcome: &ProbeOutcome, transition: TransitionKind) -> u64 {
        let mut observed = self.observed.write().await;

        observed.last_check = Some(outcome.observed_at());
        observed.last_status = Some(outcome.status());
        observed.last_error = outcome.error_message();
        observed.last_code = outcome.detail();
        observed.last_latency = outcome.latency();
        observed.checks_total += 1;

        if transition == TransitionKind::BecameDown {
            observed.downtime_count += 1;
        }

        observed.downtime_count
    }

    /// Copy the current state
    pub async fn snapshot(&self) -> MonitorSnapshot {
        let observed = self.observed.read().await;

        MonitorSnapshot {
            enabled: self.is_enabled(),
            last_check: observed.last_check,
            last_status: observed.last_status,
            last_error: observed.last_error.clone(),
            last_code: observed.last_code,
            last_latency: observed.last_latency,
            downtime_count: observed.downtime_count,
            checks_total: observed.checks_total,
        }
    }
}
