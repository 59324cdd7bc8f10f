// # Telegram Notification Channel
//
// This crate delivers storewatch alerts through the Telegram Bot API.
//
// ## Behaviour
//
// - One `sendMessage` call per recipient per alert
// - Messages are rendered as Telegram (legacy) Markdown
// - Variable fields are clipped before rendering, so a message stays under
//   4096 characters without cutting through an escape or an entity
// - No retries: a failed delivery is reported to the notifier and dropped
//
// ## Security Requirements
//
// - The bot token NEVER appears in logs or error messages
// - The bot token MUST be provided via environment variables only
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Bot API: https://core.telegram.org/bots/api
// - Send Message: POST `/bot<token>/sendMessage`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storewatch_core::error::DeliveryError;
use storewatch_core::traits::{NotificationChannel, OrderRow, RecipientId};
use storewatch_core::{Alert, Error, Result};

/// Telegram Bot API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default HTTP timeout for API requests (15 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest message the Bot API accepts
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Longest any single variable field may be before escaping
///
/// Two escaped fields at their worst (every character escaped) plus the
/// longest template stay under [`MAX_MESSAGE_CHARS`].
const MAX_FIELD_CHARS: usize = 900;

/// Appended to clipped fields
const ELLIPSIS: &str = "…";

/// Telegram notification channel
///
/// Stateless apart from the HTTP client; safe to share across tasks.
pub struct TelegramChannel {
    /// Bot token
    /// ⚠️ NEVER log this value
    bot_token: String,

    /// API base URL (overridable for tests)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bot token
impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("bot_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Envelope of every Bot API response
#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    /// Create a new Telegram channel
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token is empty or the HTTP
    /// client cannot be built.
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        let bot_token = bot_token.into();

        if bot_token.trim().is_empty() {
            return Err(Error::config("Telegram bot token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token,
            api_base: TELEGRAM_API_BASE.to_string(),
            client,
        })
    }

    /// Point the channel at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Strip the token from transport errors before they are logged
    fn redact(&self, message: String) -> String {
        message.replace(&self.bot_token, "<REDACTED>")
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    /// Deliver one alert to one chat
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /bot<token>/sendMessage
    /// {
    ///   "chat_id": "123456",
    ///   "text": "...",
    ///   "parse_mode": "Markdown"
    /// }
    /// ```
    async fn send(&self, recipient: &RecipientId, alert: &Alert) -> std::result::Result<(), DeliveryError> {
        let text = format_alert(alert);
        let payload = SendMessage {
            chat_id: recipient.as_str(),
            text: &text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::transport(self.redact(format!("HTTP request failed: {}", e)))
                }
            })?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                tracing::debug!("Telegram accepted message for chat {}", recipient);
                Ok(())
            }
            Some(ApiResponse {
                error_code,
                description,
                ..
            }) => Err(DeliveryError::rejected(
                error_code.unwrap_or(status.as_u16()),
                description.unwrap_or_else(|| "no description".to_string()),
            )),
            None if status.is_server_error() => Err(DeliveryError::transport(format!(
                "Telegram server error (transient): {}",
                status
            ))),
            None => Err(DeliveryError::rejected(
                status.as_u16(),
                "Unable to read error response",
            )),
        }
    }

    fn channel_name(&self) -> &'static str {
        "telegram"
    }
}

/// Render an alert as a Telegram Markdown message
///
/// The result never exceeds [`MAX_MESSAGE_CHARS`] characters. Long fields
/// are clipped before they are escaped, so the Markdown stays well formed.
pub fn format_alert(alert: &Alert) -> String {
    let text = match alert {
        Alert::ServiceDown {
            target,
            error,
            at,
            downtime_count,
        } => format!(
            "🚨 *CRITICAL ALERT: Website Down!*\n\n\
             🌐 URL: `{}`\n\
             ❌ Error: {}\n\
             🕐 Time: {}\n\n\
             ⚠️ Total Downtimes: {}",
            code_span(target),
            escape_markdown(&clip(error)),
            at.format("%Y-%m-%d %H:%M:%S"),
            downtime_count
        ),
        Alert::Recovered { target, latency, at } => format!(
            "✅ *Website Recovered!*\n\n\
             🌐 URL: `{}`\n\
             ⚡ Response Time: {}\n\
             🕐 Recovered At: {}",
            code_span(target),
            latency
                .map(|l| format!("{:.2}s", l.as_secs_f64()))
                .unwrap_or_else(|| "n/a".to_string()),
            at.format("%Y-%m-%d %H:%M:%S")
        ),
        Alert::NewOrder(order) => format_order(order),
    };

    debug_assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
    text
}

fn format_order(order: &OrderRow) -> String {
    format!(
        "🎉 *NEW ORDER RECEIVED!*\n\n\
         🆔 Order #`{}`\n\
         👤 Customer: {}\n\
         💰 Total: ${:.2}\n\
         📦 Status: {}\n\
         🕐 {}",
        order.id,
        escape_markdown(&clip(&order.customer_name)),
        order.total_price,
        escape_markdown(&clip(order.status.as_deref().unwrap_or("Pending"))),
        order
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Now".to_string())
    )
}

/// Escape the characters legacy Markdown treats as entity markers
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Contents of a `code` entity: no escapes apply inside, so backticks go
fn code_span(text: &str) -> String {
    clip(text).replace('`', "'")
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_FIELD_CHARS {
        return text.to_string();
    }

    let keep = MAX_FIELD_CHARS - ELLIPSIS.chars().count();
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.push_str(ELLIPSIS);
    clipped
}
