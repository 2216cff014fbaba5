//! # Event subscribers for the tracectl runtime.
//!
//! ```text
//! Event flow:
//!   Dispatcher/Engine ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                          ┌──────┴──────┐
//!                                                                          ▼             ▼
//!                                                                      LogWriter      Custom
//! ```
//!
//! Implement [`Subscribe`] to observe runtime events (metrics, audit, test probes).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
