//! # Trace viewer application model.
//!
//! Ties the generic pieces together for one concrete app:
//! - [`State`] / [`Action`] / [`TraceApp`]: the state and its named transforms.
//! - [`AppController`], [`TraceController`], [`QueryController`]: the controller tree.
//! - [`TraceStream`] sources feeding a trace into an engine chunk by chunk.
//!
//! Opening a trace replaces every engine and query; the new engine id makes
//! the tree destroy the old trace controller (shutting its engine down) and
//! mount a fresh one. Results of the old engine still in flight are rejected
//! by the reducers since their engine id no longer exists.

mod actions;
mod controllers;
mod state;
mod stream;

pub use actions::{Action, TraceApp};
pub use controllers::{AppContext, AppController, ProcessorFactory, QueryController, TraceController};
pub use state::{EngineState, QueryConfig, State, Status, TraceSource, TraceTime, VisibleTime};
pub use stream::{
    TraceBufferStream, TraceChunk, TraceFileStream, TraceHttpStream, TraceStream, open_stream,
};
