// # storewatch-core
//
// Change-detection polling core for the storewatch monitor.
//
// ## Architecture Overview
//
// Two independent loops sample external state, detect transitions against
// what they saw before, and fan alerts out to a fixed recipient list:
//
// - **Prober**: Trait for one bounded-time check of a resource
// - **classify**: Pure transition tracker (edge-triggered alerting)
// - **Notifier**: Per-recipient fan-out with isolated failures
// - **WebsiteMonitor**: Toggleable probe loop with shared `MonitorState`
// - **OrderPoller**: Cursor-based loop over an `OrderSource`
//
// ## Design Principles
//
// 1. **Single writer**: Each state object is written by its own loop only
// 2. **Snapshots**: Readers get copies, never live state
// 3. **No escaping errors**: Every failure becomes a state update or a log
// 4. **Library-First**: The daemon is a thin wiring layer over this crate

pub mod alert;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notifier;
pub mod orders;
pub mod probe;
pub mod state;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use alert::Alert;
pub use config::{OrderPollConfig, WatchConfig, WebsiteConfig};
pub use error::{CursorError, DeliveryError, Error, ProbeFailure, Result, SourceError};
pub use monitor::{IterationReport, MonitorHandle, WebsiteMonitor};
pub use notifier::{Delivery, DeliveryReport, Notifier};
pub use orders::{OrderPoller, OrderPollerHandle, PollOutcome};
pub use probe::{ProbeOutcome, Status};
pub use state::{CursorSnapshot, MemoryOrderSource, MonitorSnapshot};
pub use tracker::{TransitionKind, classify};
pub use traits::{NotificationChannel, OrderId, OrderRow, OrderSource, Prober, RecipientId};
