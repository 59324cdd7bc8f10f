//! Transition tracking
//!
//! Alerting is edge-triggered: a notification fires when the observed status
//! crosses into `Down` or recovers from it, never once per sample while a
//! status persists. [`classify`] is a pure function of the previously
//! recorded status and the new one; the owning loop records the baseline.

use crate::probe::Status;

/// Kind of transition between two consecutive observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Same status as before
    None,
    /// Entered `Down` from any other recorded status
    BecameDown,
    /// Went from `Down` straight to `Up`
    Recovered,
    /// Any other status change (recorded, not alerted)
    OtherChange,
    /// No previous observation; establishes the baseline
    FirstObservation,
}

impl TransitionKind {
    /// Whether this transition produces a notification
    pub fn alerts(&self) -> bool {
        matches!(self, TransitionKind::BecameDown | TransitionKind::Recovered)
    }
}

/// Classify the move from `previous` to `current`
///
/// Rules are applied in priority order:
///
/// 1. no previous status → `FirstObservation`
/// 2. unchanged → `None`
/// 3. now `Down` → `BecameDown`
/// 4. `Down` → `Up` → `Recovered`
/// 5. anything else → `OtherChange`
pub fn classify(previous: Option<Status>, current: Status) -> TransitionKind {
    let Some(previous) = previous else {
        return TransitionKind::FirstObservation;
    };

    if previous == current {
        return TransitionKind::None;
    }

    match (previous, current) {
        (_, Status::Down) => TransitionKind::BecameDown,
        (Status::Down, Status::Up) => TransitionKind::Recovered,
        _ => TransitionKind::OtherChange,
    }
}
