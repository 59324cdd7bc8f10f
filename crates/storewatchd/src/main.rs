// # storewatchd - storewatch daemon
//
// Thin wiring layer over storewatch-core. All monitoring logic lives in the
// libraries; this binary only:
//
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Builds the prober, the notification channel and the order source
// 4. Runs the website monitor and the order poller until a shutdown signal
//
// ## Configuration
//
// ### Notifications
// - `TELEGRAM_BOT_TOKEN`: Bot API token (required)
// - `ADMIN_USER_IDS`: Comma-separated Telegram chat ids to alert
//
// ### Website monitor
// - `WEBSITE_URL`: URL to probe (required)
// - `MONITOR_INTERVAL_SECONDS`: Delay between probes (default 300)
// - `MONITOR_TIMEOUT_SECONDS`: Upper bound for one probe (default 10)
// - `MONITOR_ENABLED`: Start probing immediately (default false)
//
// ### Order poller
// - `DATABASE_URL`: PostgreSQL URL; the order poller only runs when set
// - `ORDER_POLL_INTERVAL_SECONDS`: Delay between polls (default 60)
// - `ORDER_POLL_INITIAL_DELAY_SECONDS`: Delay before the first poll (default 10)
//
// ### Logging
// - `STOREWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Signals
//
// - `SIGTERM` / `SIGINT`: graceful shutdown
// - `SIGUSR1`: toggle the website monitor on or off
// - `SIGUSR2`: log the current monitor and order snapshots
//
// ## Example
//
// ```bash
// export TELEGRAM_BOT_TOKEN=123456:ABC-DEF
// export ADMIN_USER_IDS=11111111,22222222
// export WEBSITE_URL=https://shop.example.com
// export MONITOR_ENABLED=true
// export DATABASE_URL=postgres://shop@localhost/shop
//
// storewatchd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use storewatch_core::{
    MonitorHandle, Notifier, OrderPollConfig, OrderPollerHandle, RecipientId, WatchConfig,
    WebsiteConfig, WebsiteMonitor,
};
use storewatch_notify_telegram::TelegramChannel;
use storewatch_probe_http::HttpProber;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for draining both loops at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum StorewatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<StorewatchExitCode> for ExitCode {
    fn from(code: StorewatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
///
/// Holds the bot token; must not implement `Debug`.
struct Config {
    bot_token: String,
    admin_ids: Vec<String>,
    website_url: String,
    monitor_interval_secs: u64,
    monitor_timeout_secs: u64,
    monitor_enabled: bool,
    database_url: Option<String>,
    order_interval_secs: u64,
    order_initial_delay_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let number = |key: &str, default: u64| -> Result<u64> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds. Got: {}", key, v)),
                None => Ok(default),
            }
        };

        let monitor_enabled = match lookup("MONITOR_ENABLED") {
            Some(v) => parse_flag(&v)
                .ok_or_else(|| anyhow::anyhow!("MONITOR_ENABLED must be true or false. Got: {}", v))?,
            None => false,
        };

        Ok(Self {
            bot_token: lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            admin_ids: lookup("ADMIN_USER_IDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            website_url: lookup("WEBSITE_URL").unwrap_or_default(),
            monitor_interval_secs: number("MONITOR_INTERVAL_SECONDS", 300)?,
            monitor_timeout_secs: number("MONITOR_TIMEOUT_SECONDS", 10)?,
            monitor_enabled,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            order_interval_secs: number("ORDER_POLL_INTERVAL_SECONDS", 60)?,
            order_initial_delay_secs: number("ORDER_POLL_INITIAL_DELAY_SECONDS", 10)?,
            log_level: lookup("STOREWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks required values and ranges here; the resulting
    /// [`WatchConfig`] is validated again by the core.
    fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!(
                "TELEGRAM_BOT_TOKEN is required. \
                Set it via: export TELEGRAM_BOT_TOKEN=your_token"
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.bot_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") || token_lower == "token" {
            anyhow::bail!(
                "TELEGRAM_BOT_TOKEN appears to be a placeholder. \
                Use the token issued by @BotFather."
            );
        }

        for id in &self.admin_ids {
            if id.parse::<i64>().is_err() {
                anyhow::bail!(
                    "ADMIN_USER_IDS must be numeric Telegram chat ids. Got: '{}'",
                    id
                );
            }
        }

        if self.website_url.is_empty() {
            anyhow::bail!(
                "WEBSITE_URL is required. \
                Set it via: export WEBSITE_URL=https://shop.example.com"
            );
        }

        if !(1..=86_400).contains(&self.monitor_interval_secs) {
            anyhow::bail!(
                "MONITOR_INTERVAL_SECONDS must be between 1 and 86400 seconds. Got: {}",
                self.monitor_interval_secs
            );
        }

        if !(1..=300).contains(&self.monitor_timeout_secs) {
            anyhow::bail!(
                "MONITOR_TIMEOUT_SECONDS must be between 1 and 300 seconds. Got: {}",
                self.monitor_timeout_secs
            );
        }

        if !(1..=86_400).contains(&self.order_interval_secs) {
            anyhow::bail!(
                "ORDER_POLL_INTERVAL_SECONDS must be between 1 and 86400 seconds. Got: {}",
                self.order_interval_secs
            );
        }

        if let Some(url) = &self.database_url
            && !url.starts_with("postgres://")
            && !url.starts_with("postgresql://")
        {
            anyhow::bail!("DATABASE_URL must be a postgres:// URL");
        }

        // Validate log level
        log_level(&self.log_level)?;

        self.watch_config().validate()?;

        Ok(())
    }

    /// Core configuration built from the environment
    fn watch_config(&self) -> WatchConfig {
        let website = WebsiteConfig::new(self.website_url.clone())
            .with_interval_secs(self.monitor_interval_secs)
            .with_timeout_secs(self.monitor_timeout_secs)
            .with_enabled_at_start(self.monitor_enabled);

        let mut config = WatchConfig::new()
            .with_website(website)
            .with_recipients(self.admin_ids.iter().map(|id| RecipientId::new(id.as_str())).collect());
        config.orders = OrderPollConfig {
            interval_secs: self.order_interval_secs,
            initial_delay_secs: self.order_initial_delay_secs,
            ..OrderPollConfig::default()
        };
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "STOREWATCH_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return StorewatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return StorewatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StorewatchExitCode::ConfigError.into();
    }

    info!("Starting storewatchd daemon");
    info!(
        "Configuration loaded: {} recipient(s), order polling {}",
        config.admin_ids.len(),
        if config.database_url.is_some() { "on" } else { "off" }
    );
    if config.admin_ids.is_empty() {
        warn!("ADMIN_USER_IDS is empty; alerts will not be delivered to anyone");
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StorewatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => StorewatchExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {}", e);
                StorewatchExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {}", e);
                StorewatchExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failure of [`run_daemon`], split by exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let watch = config.watch_config();
    let website = watch
        .website
        .clone()
        .ok_or_else(|| DaemonError::Startup(anyhow::anyhow!("website monitor is not configured")))?;

    let channel = TelegramChannel::new(config.bot_token.clone()).map_err(|e| DaemonError::Startup(e.into()))?;
    let notifier = Notifier::new(Arc::new(channel), watch.recipients.clone());

    let prober = HttpProber::from_config(&website).map_err(|e| DaemonError::Startup(e.into()))?;
    let monitor = WebsiteMonitor::new(Arc::new(prober), notifier.clone(), &website)
        .map_err(|e| DaemonError::Startup(e.into()))?;
    let monitor = MonitorHandle::new(monitor);

    let poller = start_order_poller(&config, &watch, notifier).map_err(DaemonError::Startup)?;

    if website.enabled_at_start {
        monitor.enable();
        info!("Website monitoring enabled for {}", website.url);
    } else {
        info!("Website monitoring is off; send SIGUSR1 to enable it");
    }

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown(&monitor, poller.as_ref())
        .await
        .map_err(DaemonError::Runtime)?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    monitor.disable();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        monitor.join().await;
        if let Some(poller) = poller {
            poller.shutdown().await;
        }
    })
    .await;

    if drained.is_err() {
        return Err(DaemonError::Runtime(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            SHUTDOWN_GRACE
        )));
    }

    Ok(())
}

#[cfg(feature = "postgres")]
fn start_order_poller(config: &Config, watch: &WatchConfig, notifier: Notifier) -> Result<Option<OrderPollerHandle>> {
    let Some(url) = &config.database_url else {
        info!("DATABASE_URL not set; order polling disabled");
        return Ok(None);
    };

    let source = storewatch_source_postgres::PgOrderSource::connect_lazy(url)?;
    let poller = storewatch_core::OrderPoller::new(Arc::new(source), notifier, &watch.orders)?;

    Ok(Some(OrderPollerHandle::spawn(poller)))
}

#[cfg(not(feature = "postgres"))]
fn start_order_poller(config: &Config, _watch: &WatchConfig, _notifier: Notifier) -> Result<Option<OrderPollerHandle>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but storewatchd was built without the postgres feature");
    }
    Ok(None)
}

/// Log both snapshots as JSON
async fn log_status(monitor: &MonitorHandle, poller: Option<&OrderPollerHandle>) {
    let snapshot = monitor.snapshot().await;
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!("Monitor status: {}", json),
        Err(e) => warn!("Failed to render monitor status: {}", e),
    }

    if let Some(poller) = poller {
        let cursor = poller.snapshot().await;
        match serde_json::to_string(&cursor) {
            Ok(json) => info!("Order status: {}", json),
            Err(e) => warn!("Failed to render order status: {}", e),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// `SIGUSR1` and `SIGUSR2` are handled in place while waiting.
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown(monitor: &MonitorHandle, poller: Option<&OrderPollerHandle>) -> Result<&'static str> {
    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sigusr1 = signal(SignalKind::user_defined1())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGUSR1 handler: {}", e))?;
    let mut sigusr2 = signal(SignalKind::user_defined2())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGUSR2 handler: {}", e))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok("SIGTERM"),
            _ = sigint.recv() => return Ok("SIGINT"),
            _ = sigusr1.recv() => {
                if monitor.is_enabled() {
                    monitor.disable();
                    info!("Website monitoring disabled");
                } else {
                    monitor.enable();
                    info!("Website monitoring enabled");
                }
            }
            _ = sigusr2.recv() => log_status(monitor, poller).await,
        }
    }
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown(_monitor: &MonitorHandle, _poller: Option<&OrderPollerHandle>) -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
