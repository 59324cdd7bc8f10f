//! Website monitor loop
//!
//! The [`WebsiteMonitor`] orchestrates one check per interval:
//!
//! ```text
//! ┌──────────┐  ProbeOutcome  ┌──────────────┐  TransitionKind  ┌──────────┐
//! │  Prober  │───────────────▶│   classify   │─────────────────▶│ Notifier │
//! └──────────┘                └──────────────┘                  └──────────┘
//!                                    │
//!                                    ▼
//!                             ┌──────────────┐
//!                             │ MonitorState │
//!                             └──────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! `Stopped → Running → Stopped`, repeatable. [`MonitorHandle::enable`]
//! spawns the loop as its own task; [`MonitorHandle::disable`] clears the
//! flag, which the loop observes between iterations. An iteration that has
//! started always runs to completion, notifications included.
//!
//! Only one loop runs at a time. A loop spawned by a quick disable/enable
//! waits on `run_lock` until the previous loop has finished its iteration
//! and exited.
//!
//! ## Failure handling
//!
//! No iteration can end the loop. A prober that overruns its timeout is
//! recorded as `Down`/timeout; a prober that panics is recorded as
//! `Unknown`. Delivery failures are isolated by the [`Notifier`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::config::WebsiteConfig;
use crate::error::{ProbeFailure, Result};
use crate::notifier::{DeliveryReport, Notifier};
use crate::probe::ProbeOutcome;
use crate::state::{MonitorSnapshot, MonitorState};
use crate::tracker::{TransitionKind, classify};
use crate::traits::Prober;

/// Extra time granted to a prober past its own timeout before the monitor
/// gives up on it
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// What one iteration did
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Outcome recorded for this iteration
    pub outcome: ProbeOutcome,
    /// Transition from the previously recorded status
    pub transition: TransitionKind,
    /// Alert sent, if the transition called for one
    pub alert: Option<Alert>,
    /// Per-recipient delivery results, if an alert was sent
    pub delivery: Option<DeliveryReport>,
    /// Downtime counter after this iteration
    pub downtime_count: u64,
}

/// Website monitor
///
/// Owns the prober, the notifier and the monitoring state. The state has a
/// single writer: this monitor's loop.
pub struct WebsiteMonitor {
    prober: Arc<dyn Prober>,
    notifier: Notifier,
    state: Arc<MonitorState>,
    timeout: Duration,
    interval: Duration,
    wake: Notify,
    run_lock: AsyncMutex<()>,
}

impl WebsiteMonitor {
    /// Create a website monitor from configuration
    pub fn new(prober: Arc<dyn Prober>, notifier: Notifier, config: &WebsiteConfig) -> Result<Self> {
        config.validate()?;

        if config.timeout() >= config.interval() {
            warn!(
                "Probe timeout ({:?}) is not shorter than the interval ({:?})",
                config.timeout(),
                config.interval()
            );
        }

        Ok(Self::with_timings(
            prober,
            notifier,
            config.timeout(),
            config.interval(),
        ))
    }

    /// Create a website monitor with explicit timings
    pub fn with_timings(
        prober: Arc<dyn Prober>,
        notifier: Notifier,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            prober,
            notifier,
            state: Arc::new(MonitorState::new()),
            timeout,
            interval,
            wake: Notify::new(),
            run_lock: AsyncMutex::new(()),
        }
    }

    /// Shared monitoring state (read through `snapshot()`)
    pub fn state(&self) -> Arc<MonitorState> {
        Arc::clone(&self.state)
    }

    pub fn target(&self) -> &str {
        self.prober.target()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run exactly one iteration
    ///
    /// Probe, classify against the recorded status, record, and notify on
    /// `BecameDown` or `Recovered`. Does not sleep and does not look at the
    /// enable flag, so tests can step the monitor by hand.
    pub async fn tick(&self) -> IterationReport {
        let outcome = self.probe_guarded().await;

        let previous = self.state.last_status().await;
        let transition = classify(previous, outcome.status());
        let downtime_count = self.state.record(&outcome, transition).await;

        match transition {
            TransitionKind::None => {
                debug!("{} still {}", self.target(), outcome.status());
            }
            TransitionKind::FirstObservation => {
                info!("{} baseline status: {}", self.target(), outcome.status());
            }
            _ => {
                info!(
                    "Status changed: {} -> {} ({})",
                    previous.map(|s| s.as_str()).unwrap_or("none"),
                    outcome.status(),
                    self.target()
                );
            }
        }

        let alert = self.alert_for(transition, &outcome, downtime_count);
        let delivery = match &alert {
            Some(alert) => Some(self.notifier.notify(alert).await),
            None => None,
        };

        IterationReport {
            outcome,
            transition,
            alert,
            delivery,
            downtime_count,
        }
    }

    /// Probe now without recording anything
    ///
    /// Backs the dashboard's on-demand status check.
    pub async fn check_now(&self) -> ProbeOutcome {
        self.probe_guarded().await
    }

    fn alert_for(&self, transition: TransitionKind, outcome: &ProbeOutcome, downtime_count: u64) -> Option<Alert> {
        match transition {
            TransitionKind::BecameDown => Some(Alert::ServiceDown {
                target: self.target().to_string(),
                error: outcome
                    .error_message()
                    .unwrap_or_else(|| "unknown".to_string()),
                at: outcome.observed_at(),
                downtime_count,
            }),
            TransitionKind::Recovered => Some(Alert::Recovered {
                target: self.target().to_string(),
                latency: outcome.latency(),
                at: outcome.observed_at(),
            }),
            _ => None,
        }
    }

    /// Probe in a separate task so an overrun or a panic cannot escape
    async fn probe_guarded(&self) -> ProbeOutcome {
        let prober = Arc::clone(&self.prober);
        let timeout = self.timeout;
        let mut task = tokio::spawn(async move { prober.probe(timeout).await });

        match tokio::time::timeout(timeout + PROBE_GRACE, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => {
                error!("Probe of {} failed unexpectedly: {}", self.target(), join_error);
                ProbeOutcome::unknown(ProbeFailure::unexpected(format!(
                    "probe task failed: {join_error}"
                )))
            }
            Err(_) => {
                task.abort();
                warn!("Probe of {} overran its {:?} timeout", self.target(), timeout);
                ProbeOutcome::down(ProbeFailure::Timeout)
            }
        }
    }

    /// Loop body for one run generation
    async fn run(self: Arc<Self>, generation: u64) {
        let _running = self.run_lock.lock().await;
        if !self.state.is_current(generation) {
            debug!("Website monitor run {} superseded before it started", generation);
            return;
        }

        info!(
            "Starting website monitor (target={}, interval={:?}, timeout={:?})",
            self.target(),
            self.interval,
            self.timeout
        );

        while self.state.is_current(generation) {
            self.tick().await;

            let woken = self.wake.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();

            if !self.state.is_current(generation) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut woken => {
                    debug!("Website monitor woken before interval elapsed");
                }
            }
        }

        info!("Website monitor stopped ({})", self.target());
    }
}

/// Control surface for a [`WebsiteMonitor`]
///
/// This is what the dashboard holds: it toggles the loop and reads
/// snapshots, and never writes monitoring state itself.
pub struct MonitorHandle {
    monitor: Arc<WebsiteMonitor>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MonitorHandle {
    /// Wrap a monitor; the loop starts stopped
    pub fn new(monitor: WebsiteMonitor) -> Self {
        Self {
            monitor: Arc::new(monitor),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn monitor(&self) -> &WebsiteMonitor {
        &self.monitor
    }

    /// Start the loop (`Stopped → Running`)
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// - `true`: A new loop was spawned
    /// - `false`: Monitoring was already enabled; nothing changed
    pub fn enable(&self) -> bool {
        let Some(generation) = self.monitor.state.enable() else {
            debug!("Website monitor already enabled");
            return false;
        };

        let task = tokio::spawn(Arc::clone(&self.monitor).run(generation));

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);

        true
    }

    /// Request the loop to stop (`Running → Stopped`)
    ///
    /// The loop exits at its next safe point; an iteration already under way
    /// finishes first. Returns whether monitoring was enabled.
    pub fn disable(&self) -> bool {
        let was_enabled = self.monitor.state.disable();
        self.monitor.wake.notify_waiters();
        was_enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.monitor.state.is_enabled()
    }

    /// Whether any loop task is still alive (a disabled loop may still be
    /// finishing its last iteration)
    pub fn is_running(&self) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|t| !t.is_finished())
    }

    /// Wait for every spawned loop to exit
    ///
    /// Only returns once monitoring has been disabled.
    pub async fn join(&self) {
        let tasks: Vec<_> = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };

        for task in tasks {
            if let Err(e) = task.await {
                error!("Website monitor task ended abnormally: {}", e);
            }
        }
    }

    /// Copy of the current monitoring state
    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.monitor.state.snapshot().await
    }

    /// Probe now without touching the monitoring state
    pub async fn check_now(&self) -> ProbeOutcome {
        self.monitor.check_now().await
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.disable();
    }
}
