//! Error types used by the tracectl runtime.
//!
//! One enum per concern:
//!
//! - [`ControllerError`] invariant violations inside the controller tree (always fatal).
//! - [`DispatchError`] failures of the quiescence loop (livelock, controller faults).
//! - [`ActionError`] a state transform refused an action (recoverable, action dropped).
//! - [`EngineError`] failures of a single engine request (recoverable unless protocol violation).
//! - [`RemoteError`] failures of the cross-boundary proxy.
//! - [`StreamError`] / [`TraceLoadError`] trace source and loading failures.
//! - [`RuntimeError`] failures of the top-level [`Runtime`](crate::Runtime).
//!
//! Every enum provides `as_label()` (stable snake_case, for logs and events).
//! Enums that mix fatal and recoverable variants also expose `is_fatal()`.

use thiserror::Error;

use crate::controller::ControllerId;
use crate::deferred::Dropped;

/// # Invariant violations raised while invoking the controller tree.
///
/// All variants are fatal: the dispatcher stops and returns the error to the host.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// `invoke()` was called on a controller that is already being invoked
    /// (or that was left mid-invocation by an earlier fatal error).
    #[error("reentrancy in controller {id}")]
    Reentrant {
        /// Controller that was re-entered.
        id: ControllerId,
    },

    /// A controller declared the same child id twice in one `run()`.
    #[error("duplicate children controller {child} declared by {parent}")]
    DuplicateChild {
        /// Declaring controller.
        parent: ControllerId,
        /// Child id that appeared more than once.
        child: ControllerId,
    },

    /// [`LocalState::set`](crate::controller::LocalState::set) called while the
    /// owning controller's `run()` was not executing.
    #[error("cannot set_state() outside of the run() method")]
    SetStateOutsideRun,

    /// A controller's own assertion about the application state failed.
    #[error("controller invariant violated: {0}")]
    Invariant(String),
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::Reentrant { .. } => "controller_reentrant",
            ControllerError::DuplicateChild { .. } => "controller_duplicate_child",
            ControllerError::SetStateOutsideRun => "controller_set_state_outside_run",
            ControllerError::Invariant(_) => "controller_invariant",
        }
    }

    /// Shorthand for [`ControllerError::Invariant`].
    pub fn invariant(reason: impl Into<String>) -> Self {
        ControllerError::Invariant(reason.into())
    }
}

/// # Errors produced by the dispatch loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The loop kept iterating past the configured ceiling.
    #[error("controllers are stuck in a livelock after {iterations} iterations")]
    Livelock {
        /// Iterations executed before giving up.
        iterations: usize,
    },

    /// A controller raised a fatal invariant violation.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// The initial state could not be serialized.
    #[error("initial state snapshot failed: {0}")]
    Snapshot(String),

    /// The dispatcher behind a [`DispatchHandle`](crate::DispatchHandle) is gone.
    #[error("dispatcher closed")]
    Closed,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Livelock { .. } => "dispatch_livelock",
            DispatchError::Controller(e) => e.as_label(),
            DispatchError::Snapshot(_) => "dispatch_snapshot_failed",
            DispatchError::Closed => "dispatch_closed",
        }
    }

    /// `Closed` only means the host went away; everything else ends the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DispatchError::Closed)
    }
}

/// # A state transform refused to apply an action.
///
/// The action is dropped and the state is left untouched.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The transform rejected the action (unknown id, precondition failed, ...).
    #[error("action {action} rejected: {reason}")]
    Rejected {
        /// Action name.
        action: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The state could not be serialized for patch generation.
    #[error("state snapshot failed: {0}")]
    Snapshot(String),
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Rejected { .. } => "action_rejected",
            ActionError::Snapshot(_) => "action_snapshot_failed",
        }
    }

    /// Shorthand for [`ActionError::Rejected`].
    pub fn rejected(action: &'static str, reason: impl Into<String>) -> Self {
        ActionError::Rejected {
            action,
            reason: reason.into(),
        }
    }
}

/// # A structural patch could not be replayed onto a target document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("patch path {path} does not resolve: {reason}")]
pub struct PatchError {
    /// Rendered path of the offending patch.
    pub path: String,
    /// What went wrong while walking it.
    pub reason: &'static str,
}

/// # Errors produced by engine requests.
///
/// `Failed` and `Aborted` reject a single request and leave the queue running.
/// `ProtocolViolation` means the request/response correlation is broken and is fatal.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport-level failure (non-success status, connection error, ...).
    #[error("engine request failed: {reason}")]
    Failed {
        /// Transport-specific detail.
        reason: String,
    },

    /// The remote engine crashed or the engine was shut down.
    #[error("engine aborted: {reason}")]
    Aborted {
        /// Abort detail reported by the remote side.
        reason: String,
    },

    /// A response id did not match the oldest pending request.
    #[error("engine protocol violation: expected response id {expected}, got {got}")]
    ProtocolViolation {
        /// Id of the oldest pending request.
        expected: u64,
        /// Id carried by the incoming response.
        got: u64,
    },

    /// The engine queue is gone.
    #[error("engine queue closed")]
    Closed,
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::Failed { .. } => "engine_failed",
            EngineError::Aborted { .. } => "engine_aborted",
            EngineError::ProtocolViolation { .. } => "engine_protocol_violation",
            EngineError::Closed => "engine_closed",
        }
    }

    /// Only a broken request/response correlation is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::ProtocolViolation { .. })
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        EngineError::Failed {
            reason: reason.into(),
        }
    }

    pub(crate) fn aborted(reason: impl Into<String>) -> Self {
        EngineError::Aborted {
            reason: reason.into(),
        }
    }
}

impl From<Dropped> for EngineError {
    fn from(_: Dropped) -> Self {
        EngineError::Closed
    }
}

/// # Errors produced by the cross-boundary proxy.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// A response arrived for an id with no pending deferred (fatal).
    #[error("no deferred response with id {id}")]
    NoDeferred {
        /// Unrecognized response id.
        id: u64,
    },

    /// The remote handler reported a failure for this call.
    #[error("remote handler failed: {0}")]
    Handler(String),

    /// The pending call was abandoned before a response arrived.
    #[error("deferred dropped before resolution")]
    Dropped,

    /// The outbound channel is closed.
    #[error("remote channel closed")]
    Closed,
}

impl RemoteError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            RemoteError::NoDeferred { .. } => "remote_no_deferred",
            RemoteError::Handler(_) => "remote_handler_failed",
            RemoteError::Dropped => "remote_dropped",
            RemoteError::Closed => "remote_closed",
        }
    }

    /// An unmatched response id is fatal; the rest reject a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::NoDeferred { .. })
    }
}

impl From<Dropped> for RemoteError {
    fn from(_: Dropped) -> Self {
        RemoteError::Dropped
    }
}

/// # Errors produced while reading a trace source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StreamError {
    /// Local file I/O failed.
    #[error("trace file error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP request failed before or while streaming the body.
    #[error("trace download error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("trace download from {url} returned HTTP {status}")]
    Status {
        /// Requested url.
        url: String,
        /// HTTP status code.
        status: u16,
    },
}

impl StreamError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Io(_) => "stream_io",
            StreamError::Http(_) => "stream_http",
            StreamError::Status { .. } => "stream_status",
        }
    }
}

/// # Errors produced while loading a trace into an engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TraceLoadError {
    /// An engine request was rejected.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The trace source failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// # Errors produced by the top-level runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The dispatch loop stopped on a fatal error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// OS signal listeners could not be registered.
    #[error("failed to install shutdown signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Dispatch(e) => e.as_label(),
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = ControllerError::Reentrant { id: "trace".into() };
        assert_eq!(err.as_label(), "controller_reentrant");
        assert_eq!(err.to_string(), "reentrancy in controller trace");

        let err = DispatchError::from(ControllerError::SetStateOutsideRun);
        assert_eq!(err.as_label(), "controller_set_state_outside_run");
        assert!(err.is_fatal());
        assert!(!DispatchError::Closed.is_fatal());
    }

    #[test]
    fn only_protocol_violation_is_fatal_for_engines() {
        assert!(EngineError::ProtocolViolation { expected: 1, got: 2 }.is_fatal());
        assert!(!EngineError::failed("HTTP 500").is_fatal());
        assert!(!EngineError::aborted("oom").is_fatal());
        assert_eq!(EngineError::from(Dropped), EngineError::Closed);
    }

    #[test]
    fn unknown_response_id_is_fatal_for_remotes() {
        let err = RemoteError::NoDeferred { id: 7 };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "no deferred response with id 7");
        assert!(!RemoteError::Handler("boom".into()).is_fatal());
    }
}
