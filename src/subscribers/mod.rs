//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   transitions ── publish(Event) ──► Bus ──► bus listener ──► SubscriberSet
//!                                                                  │
//!                                                  ┌───────────────┼──────────┐
//!                                                  ▼               ▼          ▼
//!                                               LogWriter       Metrics     Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
