//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the external collaborators (probed website,
//! notification channel, order store) and record how the core used them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use storewatch_core::error::{DeliveryError, ProbeFailure, SourceError};
use storewatch_core::state::MemoryOrderSource;
use storewatch_core::traits::{NotificationChannel, OrderId, OrderRow, OrderSource, Prober, RecipientId};
use storewatch_core::{Alert, Notifier, ProbeOutcome, Status};
use tokio::sync::Notify;

/// What a scripted probe should do
#[derive(Debug, Clone)]
pub enum Step {
    Outcome(Status),
    Panic,
}

/// A prober that replays a script, then repeats its last step
pub struct ScriptedProber {
    script: std::sync::Mutex<VecDeque<Step>>,
    last: std::sync::Mutex<Step>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProber {
    pub fn new(statuses: &[Status]) -> Self {
        Self::with_steps(statuses.iter().copied().map(Step::Outcome).collect())
    }

    pub fn with_steps(steps: Vec<Step>) -> Self {
        let last = steps.last().cloned().unwrap_or(Step::Outcome(Status::Up));
        Self {
            script: std::sync::Mutex::new(steps.into()),
            last: std::sync::Mutex::new(last),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Hold every probe until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most probes ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

pub fn outcome_for(status: Status) -> ProbeOutcome {
    match status {
        Status::Up => ProbeOutcome::up(200, Duration::from_millis(120)),
        Status::Degraded => ProbeOutcome::degraded(503, Duration::from_millis(80)),
        Status::Down => ProbeOutcome::down(ProbeFailure::connection("connection refused")),
        Status::Unknown => ProbeOutcome::unknown(ProbeFailure::unexpected("scripted")),
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let step = {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(step) => step,
                None => self.last.lock().unwrap().clone(),
            }
        };

        match step {
            Step::Outcome(status) => outcome_for(status),
            Step::Panic => panic!("scripted probe panic"),
        }
    }

    fn target(&self) -> &str {
        "https://shop.test/"
    }
}

/// A prober that never answers
pub struct HangingProber;

#[async_trait]
impl Prober for HangingProber {
    async fn probe(&self, _timeout: Duration) -> ProbeOutcome {
        std::future::pending::<ProbeOutcome>().await
    }

    fn target(&self) -> &str {
        "https://hang.test/"
    }
}

/// How a recording channel treats a given recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Accept,
    Reject,
    Panic,
}

/// A channel that records deliveries and can fail chosen recipients
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<std::sync::Mutex<Vec<(RecipientId, Alert)>>>,
    rules: Arc<std::sync::Mutex<Vec<(RecipientId, Behaviour)>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(self, recipient: &str, behaviour: Behaviour) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((RecipientId::from(recipient), behaviour));
        self
    }

    pub fn sent(&self) -> Vec<(RecipientId, Alert)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Alert> {
        self.sent()
            .into_iter()
            .filter(|(r, _)| r.as_str() == recipient)
            .map(|(_, a)| a)
            .collect()
    }

    fn behaviour(&self, recipient: &RecipientId) -> Behaviour {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r == recipient)
            .map(|(_, b)| *b)
            .unwrap_or(Behaviour::Accept)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, recipient: &RecipientId, alert: &Alert) -> Result<(), DeliveryError> {
        match self.behaviour(recipient) {
            Behaviour::Accept => {
                self.sent
                    .lock()
                    .unwrap()
                    .push((recipient.clone(), alert.clone()));
                Ok(())
            }
            Behaviour::Reject => Err(DeliveryError::rejected(400, "chat not found")),
            Behaviour::Panic => panic!("channel exploded for {recipient}"),
        }
    }

    fn channel_name(&self) -> &'static str {
        "recording"
    }
}

/// Build a notifier over `channel` for the given recipients
pub fn notifier(channel: &RecordingChannel, recipients: &[&str]) -> Notifier {
    Notifier::new(
        Arc::new(channel.clone()),
        recipients.iter().map(|r| RecipientId::from(*r)).collect(),
    )
}

/// An order source that can be switched into a failing mode
#[derive(Clone, Default)]
pub struct SwitchableSource {
    pub inner: MemoryOrderSource,
    failing: Arc<AtomicBool>,
    newer_than_calls: Arc<AtomicUsize>,
}

impl SwitchableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn newer_than_calls(&self) -> usize {
        self.newer_than_calls.load(Ordering::SeqCst)
    }

    pub async fn insert(&self, id: i64) {
        self.inner
            .insert(OrderRow::new(id, format!("customer-{id}"), 100.0 * id as f64))
            .await;
    }
}

#[async_trait]
impl OrderSource for SwitchableSource {
    async fn latest(&self) -> Result<Option<OrderRow>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("connection reset"));
        }
        self.inner.latest().await
    }

    async fn newer_than(&self, after: OrderId) -> Result<Vec<OrderRow>, SourceError> {
        self.newer_than_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("connection reset"));
        }
        self.inner.newer_than(after).await
    }

    fn source_name(&self) -> &'static str {
        "switchable"
    }
}

/// Yield to the scheduler until `cond` holds
pub async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
