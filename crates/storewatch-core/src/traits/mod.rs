//! Core traits for the storewatch system
//!
//! This module defines the boundaries the polling core talks to.
//!
//! - [`Prober`]: One bounded-time check of an external resource
//! - [`NotificationChannel`]: Deliver an alert to one recipient
//! - [`OrderSource`]: Query the order store for new rows

pub mod channel;
pub mod order_source;
pub mod prober;

pub use channel::{NotificationChannel, RecipientId};
pub use order_source::{OrderId, OrderRow, OrderSource};
pub use prober::Prober;
