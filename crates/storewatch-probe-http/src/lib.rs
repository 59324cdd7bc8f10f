// # HTTP Prober
//
// This crate provides the HTTP reachability check for the storewatch
// website monitor.
//
// ## Classification
//
// | response | outcome |
// |---|---|
// | `200 OK` (after redirects) | `Up` with code and latency |
// | any other status | `Degraded` with code and latency |
// | request timed out | `Down` / timeout |
// | connection could not be made | `Down` / connection error |
// | anything else | `Down` / unexpected error |
//
// ## Latency
//
// Measured wall-clock around the request only, up to the response headers.
// Classification and body handling are not included.

use std::time::{Duration, Instant};

use storewatch_core::error::ProbeFailure;
use storewatch_core::traits::Prober;
use storewatch_core::{Error, ProbeOutcome, Result, WebsiteConfig};

/// Sent with every probe
const USER_AGENT: &str = concat!("storewatch/", env!("CARGO_PKG_VERSION"));

/// HTTP GET prober for one URL
pub struct HttpProber {
    /// URL to probe
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a new HTTP prober
    ///
    /// The timeout is not fixed here; each probe is given its own.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create a prober for the configured website
    pub fn from_config(config: &WebsiteConfig) -> Result<Self> {
        Self::new(config.url.clone())
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let result = self.client.get(&self.url).timeout(timeout).send().await;
        let latency = started.elapsed();

        match result {
            Ok(response) => {
                let code = response.status().as_u16();
                if response.status() == reqwest::StatusCode::OK {
                    tracing::debug!("{} answered {} in {:?}", self.url, code, latency);
                    ProbeOutcome::up(code, latency)
                } else {
                    tracing::debug!("{} answered unexpected {} in {:?}", self.url, code, latency);
                    ProbeOutcome::degraded(code, latency)
                }
            }
            Err(e) => {
                let failure = classify_error(&e);
                tracing::debug!("Probe of {} failed: {}", self.url, failure);
                ProbeOutcome::down(failure)
            }
        }
    }

    fn target(&self) -> &str {
        &self.url
    }
}

/// Map a transport error onto the failure taxonomy
///
/// A connect attempt that runs out of time counts as a timeout.
fn classify_error(e: &reqwest::Error) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout
    } else if e.is_connect() {
        ProbeFailure::connection(e.to_string())
    } else {
        ProbeFailure::unexpected(e.to_string())
    }
}
