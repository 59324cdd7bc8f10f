//! Probe outcomes
//!
//! A [`ProbeOutcome`] is the structured result of one bounded-time check.
//! Either the check produced a response (`detail` and `latency` are set) or
//! it did not (`error` is set), never both. The fields are private; the
//! constructors are the only way to build an outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ProbeFailure;

/// Observed condition of a monitored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Responded with the primary success code
    Up,
    /// Responded, but not with the primary success code
    Degraded,
    /// Did not respond (timeout, connection failure)
    Down,
    /// The check itself misbehaved; condition unknown
    Unknown,
}

impl Status {
    /// Lowercase name used in logs and snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Degraded => "degraded",
            Status::Down => "down",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOutcome")]
pub struct ProbeOutcome {
    status: Status,
    detail: Option<u16>,
    #[serde(with = "latency_secs")]
    latency: Option<Duration>,
    error: Option<ProbeFailure>,
    observed_at: DateTime<Utc>,
}

impl ProbeOutcome {
    /// The target answered with its primary success code
    pub fn up(code: u16, latency: Duration) -> Self {
        Self::responded(Status::Up, code, latency)
    }

    /// The target answered with some other code
    pub fn degraded(code: u16, latency: Duration) -> Self {
        Self::responded(Status::Degraded, code, latency)
    }

    /// The target did not answer
    pub fn down(failure: ProbeFailure) -> Self {
        Self::failed(Status::Down, failure)
    }

    /// The probe itself failed in a way that says nothing about the target
    pub fn unknown(failure: ProbeFailure) -> Self {
        Self::failed(Status::Unknown, failure)
    }

    fn responded(status: Status, code: u16, latency: Duration) -> Self {
        Self {
            status,
            detail: Some(code),
            latency: Some(latency),
            error: None,
            observed_at: Utc::now(),
        }
    }

    fn failed(status: Status, failure: ProbeFailure) -> Self {
        Self {
            status,
            detail: None,
            latency: None,
            error: Some(failure),
            observed_at: Utc::now(),
        }
    }

    /// Override the observation time
    pub fn observed_at_time(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Protocol status code, present only for `Up` and `Degraded`
    pub fn detail(&self) -> Option<u16> {
        self.detail
    }

    /// Wall-clock time of the request, present only when there was a response
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Latency in seconds, rounded to two decimals
    pub fn latency_secs(&self) -> Option<f64> {
        self.latency
            .map(|l| (l.as_secs_f64() * 100.0).round() / 100.0)
    }

    /// Classified failure, present only for `Down` and `Unknown`
    pub fn error(&self) -> Option<&ProbeFailure> {
        self.error.as_ref()
    }

    /// Failure rendered as a message
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Unchecked wire form; only reaches callers through `TryFrom`
#[derive(Deserialize)]
struct RawOutcome {
    status: Status,
    detail: Option<u16>,
    #[serde(with = "latency_secs")]
    latency: Option<Duration>,
    error: Option<ProbeFailure>,
    observed_at: DateTime<Utc>,
}

impl TryFrom<RawOutcome> for ProbeOutcome {
    type Error = String;

    fn try_from(raw: RawOutcome) -> Result<Self, Self::Error> {
        let outcome = match (raw.status, raw.detail, raw.latency, raw.error) {
            (Status::Up | Status::Degraded, Some(code), Some(latency), None) => {
                Self::responded(raw.status, code, latency)
            }
            (Status::Down | Status::Unknown, None, None, Some(failure)) => Self::failed(raw.status, failure),
            (status, ..) => {
                return Err(format!(
                    "inconsistent {status} outcome: a response and an error are mutually exclusive"
                ));
            }
        };

        Ok(outcome.observed_at_time(raw.observed_at))
    }
}

mod latency_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
