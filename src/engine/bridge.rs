//! # Worker-bridge transport.
//!
//! Frames requests as `{id, method, data}` and expects `{id, aborted, data}`
//! back from a worker hosting a [`TraceProcessor`].
//!
//! ```text
//! Engine queue ──BridgeRequest──► worker (blocking thread) ──► processor.handle()
//!      ▲                                    │
//!      └──────────BridgeResponse────────────┘  (aborted = true on crash, then the worker exits)
//! ```
//!
//! ## Rules
//! - A response id must equal the id of the request in flight, else
//!   [`EngineError::ProtocolViolation`].
//! - `aborted = true` rejects with [`EngineError::Aborted`] carrying the worker's message.
//! - A worker that went away counts as aborted.

use std::panic::{AssertUnwindSafe, catch_unwind};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::method::{EngineMethod, EngineMode, EngineRequest};
use super::processor::TraceProcessor;
use super::transport::Transport;
use crate::error::EngineError;
use crate::subscribers::panic_message;

/// Request frame sent to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub id: u64,
    pub method: EngineMethod,
    pub data: Vec<u8>,
}

/// Response frame sent back by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResponse {
    pub id: u64,
    /// The worker crashed; `data` holds its message.
    pub aborted: bool,
    pub data: Vec<u8>,
}

/// Transport over a pair of channels to a worker.
pub struct BridgeTransport {
    tx: mpsc::UnboundedSender<BridgeRequest>,
    rx: mpsc::UnboundedReceiver<BridgeResponse>,
}

impl BridgeTransport {
    /// Wraps channels connected to an existing worker.
    pub fn new(
        tx: mpsc::UnboundedSender<BridgeRequest>,
        rx: mpsc::UnboundedReceiver<BridgeResponse>,
    ) -> Self {
        Self { tx, rx }
    }

    /// Hosts `processor` on a blocking thread and connects to it.
    pub fn spawn_worker(processor: Box<dyn TraceProcessor>) -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || serve_worker(processor, req_rx, resp_tx));
        Self::new(req_tx, resp_rx)
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn mode(&self) -> EngineMode {
        EngineMode::Wasm
    }

    async fn round_trip(&mut self, request: EngineRequest) -> Result<Vec<u8>, EngineError> {
        let expected = request.id;
        let frame = BridgeRequest {
            id: request.id,
            method: request.method,
            data: request.data,
        };
        if self.tx.send(frame).is_err() {
            return Err(EngineError::aborted("worker is gone"));
        }

        let response = self
            .rx
            .recv()
            .await
            .ok_or_else(|| EngineError::aborted("worker exited"))?;

        if response.id != expected {
            return Err(EngineError::ProtocolViolation {
                expected,
                got: response.id,
            });
        }
        if response.aborted {
            return Err(EngineError::aborted(String::from_utf8_lossy(&response.data)));
        }
        Ok(response.data)
    }
}

fn serve_worker(
    mut processor: Box<dyn TraceProcessor>,
    mut rx: mpsc::UnboundedReceiver<BridgeRequest>,
    tx: mpsc::UnboundedSender<BridgeResponse>,
) {
    while let Some(BridgeRequest { id, method, data }) = rx.blocking_recv() {
        let outcome = catch_unwind(AssertUnwindSafe(|| processor.handle(method, &data)))
            .unwrap_or_else(|panic| Err(format!("processor panicked: {}", panic_message(&*panic))));

        let (aborted, data) = match outcome {
            Ok(data) => (false, data),
            Err(reason) => {
                tracing::error!(request = id, %method, %reason, "trace processor crashed");
                (true, reason.into_bytes())
            }
        };
        if tx.send(BridgeResponse { id, aborted, data }).is_err() || aborted {
            break;
        }
    }
}
