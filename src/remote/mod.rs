//! # Cross-boundary call proxy.
//!
//! A [`Remote`] turns a local call into a tagged [`RemoteRequest`] and keeps a
//! pending deferred per id. The responder side ([`forward_remote_calls`]) runs
//! each call through a [`RemoteHandler`] and posts back a [`RemoteResponse`].
//!
//! ```text
//!   caller                         boundary                        responder
//!   Remote::send(call) ──► RemoteRequest{id, call} ──► forward_remote_calls
//!        │                                                 └─► handler.handle(call)
//!        ▼                                                        │
//!   Deferred ◄── handle_response ◄── RemoteResponse{id, result} ◄─┘
//! ```
//!
//! ## Rules
//! - Ids are allocated from a per-proxy monotonically increasing counter.
//! - A response resolves and removes exactly one pending deferred.
//! - A response whose id has no pending deferred is fatal ([`RemoteError::NoDeferred`](crate::RemoteError::NoDeferred)).
//! - Handler failures travel back as `Err(String)` and reject the caller's deferred.

mod message;
mod proxy;
mod responder;

pub use message::{RemoteCall, RemoteRequest, RemoteResponse};
pub use proxy::Remote;
pub use responder::{RemoteHandler, forward_remote_calls};
