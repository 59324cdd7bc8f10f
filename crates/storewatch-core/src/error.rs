//! Error types for the storewatch core
//!
//! Each boundary owns a closed error enumeration so that callers (and tests)
//! can match on the kind of failure rather than on message text:
//!
//! - [`ProbeFailure`]: why a probe did not produce a response
//! - [`DeliveryError`]: why one recipient did not receive an alert
//! - [`SourceError`]: why the order data source could not be queried
//! - [`CursorError`]: a rejected cursor movement
//!
//! [`Error`] is the crate-level type used for construction and configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::OrderId;

/// Result type alias for storewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the storewatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data source errors
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    /// Notification delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Cursor errors
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Classified reason a probe produced no usable response
///
/// Probe failures are never raised: they are folded into a `Down` (or
/// `Unknown`) [`ProbeOutcome`](crate::probe::ProbeOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// The probe did not complete within its timeout
    #[error("timeout")]
    Timeout,

    /// The target could not be reached (refused, DNS, TLS handshake)
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else, including a probe that panicked
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProbeFailure {
    /// Create a connection failure
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an unexpected failure
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }
}

/// Why a single recipient did not receive an alert
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel did not answer in time
    #[error("delivery timed out")]
    Timeout,

    /// Network or protocol failure talking to the channel
    #[error("transport failure: {0}")]
    Transport(String),

    /// The channel answered and refused the message
    #[error("rejected by channel (status {status}): {description}")]
    Rejected {
        /// Status code reported by the channel
        status: u16,
        /// Channel-provided description
        description: String,
    },

    /// The delivery attempt was aborted (the channel panicked)
    #[error("delivery aborted: {0}")]
    Aborted(String),
}

impl DeliveryError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a rejection error
    pub fn rejected(status: u16, description: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            description: description.into(),
        }
    }
}

/// Why the order data source could not answer a query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The query did not complete in time
    #[error("query timed out")]
    Timeout,

    /// The data source could not be reached
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// The query ran but failed (bad schema, decode error)
    #[error("query failed: {0}")]
    Query(String),

    /// The query task itself failed (panicked or was cancelled)
    #[error("unexpected data source failure: {0}")]
    Unexpected(String),
}

impl SourceError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create an unexpected-failure error
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }
}

/// Rejected cursor movement
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    /// The proposed key does not move the cursor forward
    #[error("cursor would not advance: current {current}, proposed {proposed}")]
    NotIncreasing {
        /// Key the cursor currently holds
        current: OrderId,
        /// Key that was rejected
        proposed: OrderId,
    },
}
