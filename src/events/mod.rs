//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the dispatcher, the
//! controller tree, engines and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` (actions, iterations, quiescence, livelock),
//!   `ControllerNode` (created/destroyed), `Engine` queue loops (failures, aborts),
//!   `TraceController` (mode selection), `SubscriberSet` workers (overflow/panic),
//!   `Runtime` (shutdown).
//! - **Consumers**: `Runtime::subscriber_listener()` (fans out to `SubscriberSet`).
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
