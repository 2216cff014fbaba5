//! # tracectl
//!
//! **tracectl** is the control layer of a trace viewer: a tree of reactive
//! controllers that re-derives its shape from one shared application state,
//! a dispatch loop that runs the tree to quiescence after every change, and a
//! strictly ordered request queue in front of each external trace processing
//! engine.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   host / frontend                                   external engines
//!        │ dispatch(Action)                            (opaque bytes in/out)
//!        ▼                                                   ▲
//! ┌──────────────────────────────────────────────┐           │
//! │  Dispatcher                                  │           │
//! │  - State (Arc, replaced between iterations)  │   ┌───────┴────────┐
//! │  - action queue (FIFO)                       │   │ Engine queue   │
//! │  - root ControllerNode                       │   │ one in flight  │
//! └──────┬───────────────────────────────┬───────┘   │ BridgeTransport│
//!        │ invoke()                      │           │ HttpTransport  │
//!        ▼                               │           └───────▲────────┘
//!   AppController                        │                   │ submit()
//!     └─ TraceController (per engine) ───┼───────────────────┤
//!          └─ QueryController (per query)┼───────────────────┘
//!                                        │
//!          results come back as actions ─┘
//!
//!  after quiescence: Frontend::patch_state(all patches of the cycle)
//!  out of band:      Publisher ──► Frontend::publish(Publication)
//!  runtime events:   Bus ──► SubscriberSet ──► LogWriter / custom subscribers
//! ```
//!
//! ### Dispatch cycle
//! ```text
//! while queue non-empty || a controller changed its local state {
//!   ├─► drain queue into a batch (later dispatches wait for the next pass)
//!   ├─► apply each action atomically, diffing snapshots into patches
//!   ├─► invoke root: run(), destroy vanished children, mount new ones, invoke all
//!   └─► iterations += 1   (past the ceiling: LivelockDetected, fatal)
//! }
//! deliver the accumulated patches once (skipped when there are none)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                                 |
//! |-------------------|---------------------------------------------------------------|----------------------------------------------------|
//! | **Controllers**   | Reactive units reconciled by id.                              | [`Controller`], [`ChildSpec`], [`LocalState`]      |
//! | **Dispatch**      | Quiescence loop with livelock protection and atomic patches.  | [`Dispatcher`], [`DispatchHandle`], [`Patch`]      |
//! | **Engines**       | Strictly ordered byte RPC over two transports.                | [`Engine`], [`BridgeTransport`], [`HttpTransport`] |
//! | **Remote proxy**  | Tagged request/response across a boundary.                    | [`Remote`], [`RemoteHandler`]                      |
//! | **Trace app**     | State, actions and controllers of the viewer.                 | [`app::State`], [`app::Action`], [`app::AppController`] |
//! | **Subscriber API**| Hook into runtime events.                                     | [`Subscribe`], [`Event`]                           |
//! | **Configuration** | Iteration ceiling, bus capacity, engine transport settings.  | [`Config`]                                         |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tracectl::app::{Action, AppContext, AppController, State};
//! use tracectl::{Config, EngineMethod, RecordingFrontend, Runtime, TraceProcessor};
//!
//! struct Echo;
//!
//! impl TraceProcessor for Echo {
//!     fn handle(&mut self, _method: EngineMethod, data: &[u8]) -> Result<Vec<u8>, String> {
//!         Ok(data.to_vec())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let runtime = Runtime::builder(cfg.clone()).build();
//!
//!     let state = State::new(cfg.engine_mode);
//!     let frontend = Arc::new(RecordingFrontend::new(serde_json::to_value(&state)?));
//!     let ctx = AppContext::new(cfg, || Box::new(Echo));
//!     let dispatcher = runtime.dispatcher(state, AppController::spec(ctx), frontend)?;
//!
//!     dispatcher.handle().dispatch(Action::OpenTraceFromFile { path: "trace.pftrace".into() })?;
//!     runtime.run(dispatcher, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
mod controller;
mod core;
mod deferred;
mod dispatch;
mod engine;
mod error;
mod events;
mod frontend;
mod remote;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use crate::core::{Config, DEFAULT_MAX_ITERATIONS, NewEngineMode, Runtime, RuntimeBuilder};
pub use controller::{ChildSpec, Children, Controller, ControllerId, LocalState, Mount, RunContext};
pub use deferred::{Deferred, Dropped, Resolver, deferred};
pub use dispatch::{
    Action, DispatchHandle, Dispatcher, Model, Patch, PatchOp, PathSegment, Settled, apply_patches,
    diff,
};
pub use engine::{
    BridgeRequest, BridgeResponse, BridgeTransport, Engine, EngineBuilder, EngineMethod, EngineMode,
    EngineRequest, HttpTransport, LoadingTracker, PublishingTracker, TraceProcessor, TraceSpan,
    Transport, check_connection,
};
pub use error::{
    ActionError, ControllerError, DispatchError, EngineError, PatchError, RemoteError, RuntimeError,
    StreamError, TraceLoadError,
};
pub use events::{Bus, Event, EventKind};
pub use frontend::{
    Frontend, FrontendCall, FrontendHandler, Publication, PublishKind, Publisher, Recording,
    RecordingFrontend, RemoteFrontend,
};
pub use remote::{
    Remote, RemoteCall, RemoteHandler, RemoteRequest, RemoteResponse, forward_remote_calls,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
