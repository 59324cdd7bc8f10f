// # Prober Trait
//
// Defines the interface for a single, bounded-time check of an external
// resource.
//
// ## Implementations
//
// - HTTP reachability: `storewatch-probe-http` crate
//
// ## Usage
//
// ```rust,ignore
// use storewatch_core::Prober;
// use std::time::Duration;
//
// let prober = /* Prober implementation */;
// let outcome = prober.probe(Duration::from_secs(10)).await;
// println!("{} is {}", prober.target(), outcome.status());
// ```

use async_trait::async_trait;
use std::time::Duration;

use crate::probe::ProbeOutcome;

/// Trait for probe implementations
///
/// A prober is stateless: it performs the check and reports what it saw.
/// Deciding whether the result is worth an alert is owned by the
/// [`WebsiteMonitor`](crate::monitor::WebsiteMonitor).
///
/// # Contract
///
/// - `probe()` never fails: timeouts, refused connections and any other
///   error are folded into a `Down` outcome with a classified
///   [`ProbeFailure`](crate::error::ProbeFailure)
/// - The check must finish within `timeout`
/// - Latency covers the request only, not outcome classification
/// - No side effects beyond the network call itself
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one check
    ///
    /// # Parameters
    ///
    /// - `timeout`: Upper bound for the whole check
    async fn probe(&self, timeout: Duration) -> ProbeOutcome;

    /// Name of the probed resource (URL, host), used in alerts and logs
    fn target(&self) -> &str;
}
