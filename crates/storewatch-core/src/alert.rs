//! Alert payloads
//!
//! Alerts are structured; rendering them (markup, length limits) belongs to
//! the [`NotificationChannel`](crate::traits::NotificationChannel).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::traits::OrderRow;

/// A notification produced by one of the poll loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    /// The monitored target went down
    ServiceDown {
        target: String,
        error: String,
        at: DateTime<Utc>,
        /// Outages seen since start, this one included
        downtime_count: u64,
    },

    /// The monitored target answered again after being down
    Recovered {
        target: String,
        latency: Option<Duration>,
        at: DateTime<Utc>,
    },

    /// A new order row was observed
    NewOrder(OrderRow),
}

impl Alert {
    /// Short kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::ServiceDown { .. } => "service_down",
            Alert::Recovered { .. } => "recovered",
            Alert::NewOrder(_) => "new_order",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::ServiceDown { target, error, at, .. } => {
                write!(f, "{target} is DOWN ({error}) at {}", at.format("%Y-%m-%d %H:%M:%S"))
            }
            Alert::Recovered { target, latency, at } => {
                write!(f, "{target} RECOVERED at {}", at.format("%Y-%m-%d %H:%M:%S"))?;
                if let Some(latency) = latency {
                    write!(f, " ({:.2}s)", latency.as_secs_f64())?;
                }
                Ok(())
            }
            Alert::NewOrder(order) => {
                write!(f, "new order #{} from {} ({:.2})", order.id, order.customer_name, order.total_price)
            }
        }
    }
}
