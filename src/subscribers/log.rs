//! # LogWriter: renders runtime events through `tracing`.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! DEBUG tracectl: action applied action="OpenTraceFromFile" patches=3 iteration=1
//!  WARN tracectl: action rejected action="SetEngineReady" reason="action SetEngineReady rejected: unknown engine 0" iteration=2
//! DEBUG tracectl: quiescent iterations=2 patches=3
//! DEBUG tracectl: controller created id="1" parent="app"
//!  WARN tracectl: engine request failed engine="0" request=4 method="raw_query" reason="HTTP 500"
//!  INFO tracectl: shutdown requested
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        let action = e.action.as_deref().unwrap_or("");
        let controller = e.controller.as_deref().unwrap_or("");
        let engine = e.engine.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ActionApplied => {
                tracing::debug!(seq = e.seq, action, patches = e.count, iteration = e.iteration, "action applied");
            }
            EventKind::ActionRejected => {
                tracing::warn!(seq = e.seq, action, reason, iteration = e.iteration, "action rejected");
            }
            EventKind::IterationCompleted => {
                tracing::trace!(seq = e.seq, iteration = e.iteration, rerun = e.count, "iteration completed");
            }
            EventKind::Quiescent => {
                tracing::debug!(seq = e.seq, iterations = e.iteration, patches = e.count, "quiescent");
            }
            EventKind::LivelockDetected => {
                tracing::error!(seq = e.seq, iterations = e.iteration, "livelock detected");
            }
            EventKind::ControllerCreated => {
                tracing::debug!(seq = e.seq, id = controller, parent = reason, "controller created");
            }
            EventKind::ControllerDestroyed => {
                tracing::debug!(seq = e.seq, id = controller, parent = reason, "controller destroyed");
            }
            EventKind::EngineRequestFailed => {
                tracing::warn!(seq = e.seq, engine, request = e.request, method = action, reason, "engine request failed");
            }
            EventKind::EngineAborted => {
                tracing::error!(seq = e.seq, engine, reason, "engine aborted");
            }
            EventKind::EngineModeSelected => {
                tracing::info!(seq = e.seq, engine, mode = reason, "engine mode selected");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(seq = e.seq, subscriber = controller, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(seq = e.seq, subscriber = controller, info = reason, "subscriber panicked");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
