//! # Engine request pipelining.
//!
//! An [`Engine`] serializes opaque byte requests to one external trace
//! processing engine over a [`Transport`]:
//!
//! ```text
//! submit(method, bytes) ──► FIFO ──► drive_queue ──► transport.round_trip() ──► settle deferred
//!                            (one in flight at a time, per engine)
//! ```
//!
//! Transports:
//! - [`BridgeTransport`] frames `{id, method, data}` / `{id, aborted, data}` to a
//!   worker hosting a [`TraceProcessor`] and validates response ids.
//! - [`HttpTransport`] posts to `{base}/{method}`; [`check_connection`] probes
//!   `{base}/status` under a bounded timeout.
//!
//! ## Rules
//! - Requests reach the transport strictly in submission order; ids increase monotonically.
//! - A failed request rejects alone; the next one is still sent.
//! - After an abort (or a protocol violation) every queued and later request rejects.
//! - Distinct engines are independent.

mod bridge;
mod http;
mod loading;
mod method;
mod processor;
mod queue;
mod transport;

pub use bridge::{BridgeRequest, BridgeResponse, BridgeTransport};
pub use http::{HttpTransport, check_connection};
pub use loading::{LoadingTracker, PublishingTracker};
pub use method::{EngineMethod, EngineMode, EngineRequest, TraceSpan};
pub use processor::TraceProcessor;
pub use queue::{Engine, EngineBuilder};
pub use transport::Transport;
