//! # Example: open_trace
//!
//! Opens a trace, waits until the engine is ready, runs one query and exits.
//!
//! Shows how to:
//! - Build a [`Runtime`] with the built-in [`LogWriter`] subscriber.
//! - Mount the trace viewer tree with [`AppController`].
//! - Host a [`TraceProcessor`] behind the worker bridge (used when no
//!   accelerator answers on `rpc_url`).
//! - Observe state and query results through a [`RecordingFrontend`].
//!
//! ## Flow
//! ```text
//! OpenTraceFromFile ──► AppController ──► TraceController("0")
//!                                           ├─► probe {rpc_url}/status (falls back to the worker bridge)
//!                                           ├─► parse chunks, notify_eof
//!                                           └─► SetEngineReady ──► Ready
//! ExecuteQuery ──► QueryController ──► engine.query() ──► Publication::QueryResult ──► DeleteQuery
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example open_trace -- path/to/trace.pftrace
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracectl::app::{Action, AppContext, AppController, State};
use tracectl::{
    Config, EngineMethod, LogWriter, Publication, RecordingFrontend, Runtime, Subscribe,
    TraceProcessor,
};

/// Stand-in processor: counts bytes and echoes queries.
#[derive(Default)]
struct ByteCounter {
    bytes: usize,
}

impl TraceProcessor for ByteCounter {
    fn handle(&mut self, method: EngineMethod, data: &[u8]) -> Result<Vec<u8>, String> {
        match method {
            EngineMethod::Parse => {
                self.bytes += data.len();
                Ok(Vec::new())
            }
            EngineMethod::RawQuery => Ok(format!(
                "{} bytes parsed; query: {}",
                self.bytes,
                String::from_utf8_lossy(data)
            )
            .into_bytes()),
            _ => Ok(Vec::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: open_trace <trace file>")?;

    let cfg = Config {
        rpc_connect_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let runtime = Runtime::builder(cfg.clone()).with_subscribers(subs).build();

    let state = State::new(cfg.engine_mode);
    let frontend = Arc::new(RecordingFrontend::new(serde_json::to_value(&state)?));
    let ctx = AppContext::new(cfg, || Box::new(ByteCounter::default()));
    let dispatcher = runtime.dispatcher(state, AppController::spec(ctx), frontend.clone())?;
    let handle = dispatcher.handle();
    let token = CancellationToken::new();

    let driver = {
        let frontend = Arc::clone(&frontend);
        let token = token.clone();
        tokio::spawn(async move {
            handle.dispatch(Action::OpenTraceFromFile { path })?;
            frontend
                .wait_until(|r| {
                    r.mirror["engines"]["0"]["ready"] == serde_json::json!(true)
                        || r.mirror["engines"]["0"]["failure"].is_string()
                        || r.mirror["status"]["message"]
                            .as_str()
                            .is_some_and(|m| m.contains("error"))
                })
                .await;
            if frontend.mirror()["engines"]["0"]["ready"] != serde_json::json!(true) {
                token.cancel();
                return anyhow::Ok(());
            }

            handle.dispatch(Action::ExecuteQuery {
                query_id: "summary".into(),
                engine_id: "0".into(),
                query: "select count(*) from slice".into(),
            })?;
            frontend
                .wait_until(|r| {
                    r.publications
                        .iter()
                        .any(|p| matches!(p, Publication::QueryResult { .. }))
                })
                .await;
            token.cancel();
            anyhow::Ok(())
        })
    };

    runtime.run(dispatcher, token).await?;
    driver.await??;

    for publication in frontend.publications() {
        if let Publication::QueryResult {
            query_id,
            duration,
            result,
            ..
        } = publication
        {
            match result {
                Ok(bytes) => println!("{query_id} ({duration:?}): {}", String::from_utf8_lossy(&bytes)),
                Err(e) => println!("{query_id} ({duration:?}) failed: {e}"),
            }
        }
    }
    println!("status: {}", frontend.mirror()["status"]["message"]);
    Ok(())
}
