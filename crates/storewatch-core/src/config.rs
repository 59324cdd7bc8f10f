//! Configuration types for the storewatch system
//!
//! This module defines all configuration structures used by the poll loops.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::RecipientId;

/// Main storewatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Website monitor settings (`None` disables the monitor entirely)
    #[serde(default)]
    pub website: Option<WebsiteConfig>,

    /// Order poller settings
    #[serde(default)]
    pub orders: OrderPollConfig,

    /// Alert recipients, fixed for the process lifetime
    #[serde(default)]
    pub recipients: Vec<RecipientId>,
}

impl WatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the website monitor
    pub fn with_website(mut self, website: WebsiteConfig) -> Self {
        self.website = Some(website);
        self
    }

    /// Set the recipients
    pub fn with_recipients(mut self, recipients: Vec<RecipientId>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(website) = &self.website {
            website.validate()?;
        }
        self.orders.validate()?;

        if self.recipients.iter().any(|r| r.as_str().trim().is_empty()) {
            return Err(crate::Error::config("Recipient identifiers cannot be empty"));
        }

        Ok(())
    }
}

/// Website monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// URL to probe
    pub url: String,

    /// Upper bound for one probe (in seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between probes (in seconds)
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,

    /// Start the monitor loop immediately instead of waiting for the toggle
    #[serde(default)]
    pub enabled_at_start: bool,
}

impl WebsiteConfig {
    /// Create a website configuration with default timings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_probe_timeout_secs(),
            interval_secs: default_monitor_interval_secs(),
            enabled_at_start: false,
        }
    }

    /// Set the probe timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the poll interval
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Enable or disable the monitor at start
    pub fn with_enabled_at_start(mut self, enabled: bool) -> Self {
        self.enabled_at_start = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the website configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Website URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Website URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Monitor interval must be > 0"));
        }
        Ok(())
    }
}

/// Order poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPollConfig {
    /// Delay between polls (in seconds)
    #[serde(default = "default_order_interval_secs")]
    pub interval_secs: u64,

    /// Delay before the first poll (in seconds)
    #[serde(default = "default_order_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Upper bound for one data source query (in seconds)
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl OrderPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Validate the order poller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Order poll interval must be > 0"));
        }
        if self.query_timeout_secs == 0 {
            return Err(crate::Error::config("Order query timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for OrderPollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_order_interval_secs(),
            initial_delay_secs: default_order_initial_delay_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_monitor_interval_secs() -> u64 {
    300
}

fn default_order_interval_secs() -> u64 {
    60
}

fn default_order_initial_delay_secs() -> u64 {
    10
}

fn default_query_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn website_defaults() {
        let website = WebsiteConfig::new("https://shop.example.com/");

        assert_eq!(website.timeout(), Duration::from_secs(10));
        assert_eq!(website.interval(), Duration::from_secs(300));
        assert!(!website.enabled_at_start);
        assert!(website.validate().is_ok());
    }

    #[test]
    fn rejects_bad_website_settings() {
        assert!(WebsiteConfig::new("").validate().is_err());
        assert!(WebsiteConfig::new("ftp://shop").validate().is_err());
        assert!(
            WebsiteConfig::new("https://shop")
                .with_interval_secs(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: WatchConfig = serde_json::from_str(
            r#"{ "website": { "url": "https://shop.example.com" }, "recipients": ["101", "202"] }"#,
        )
        .unwrap();

        assert_eq!(config.orders.interval_secs, 60);
        assert_eq!(config.orders.initial_delay_secs, 10);
        assert_eq!(config.website.as_ref().map(|w| w.timeout_secs), Some(10));
        assert_eq!(config.recipients, vec![RecipientId::new("101"), RecipientId::new("202")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blank_recipient() {
        let config = WatchConfig::new().with_recipients(vec![RecipientId::new(" ")]);
        assert!(config.validate().is_err());
    }
}
