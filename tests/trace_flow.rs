//! End-to-end trace flow: open a trace, load it into an engine, run a query.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracectl::app::{Action, AppContext, AppController, State};
use tracectl::{
    Config, DispatchHandle, EngineMethod, Event, EventKind, NewEngineMode, Publication, Recording,
    RecordingFrontend, Runtime, RuntimeError, TraceProcessor, TraceSpan,
};

/// Bounds reported by the in-process engine: two seconds starting at zero.
const TRACE_SPAN: TraceSpan = TraceSpan {
    start_ns: 0,
    end_ns: 2_000_000_000,
};

/// Counts parsed bytes and answers queries with that count.
#[derive(Default)]
struct CountingProcessor {
    parsed: usize,
    eof: bool,
}

impl TraceProcessor for CountingProcessor {
    fn handle(&mut self, method: EngineMethod, data: &[u8]) -> Result<Vec<u8>, String> {
        match method {
            EngineMethod::Parse => {
                self.parsed += data.len();
                Ok(Vec::new())
            }
            EngineMethod::NotifyEof => {
                self.eof = true;
                Ok(Vec::new())
            }
            EngineMethod::RawQuery if !self.eof => Err("query before end of input".into()),
            EngineMethod::RawQuery => {
                let query = String::from_utf8_lossy(data);
                Ok(format!("{} bytes: {query}", self.parsed).into_bytes())
            }
            EngineMethod::TraceBounds => Ok(TRACE_SPAN.encode()),
            EngineMethod::ComputeMetric | EngineMethod::RestoreInitialTables => Ok(Vec::new()),
        }
    }
}

struct Harness {
    frontend: Arc<RecordingFrontend>,
    handle: DispatchHandle<Action>,
    events: broadcast::Receiver<Event>,
    token: CancellationToken,
    task: JoinHandle<Result<(), RuntimeError>>,
}

impl Harness {
    fn start(cfg: Config) -> Self {
        let runtime = Runtime::builder(cfg.clone()).build();
        let events = runtime.bus().subscribe();

        let state = State::new(cfg.engine_mode);
        let frontend = Arc::new(RecordingFrontend::new(serde_json::to_value(&state).unwrap()));
        let ctx = AppContext::new(cfg, || Box::new(CountingProcessor::default()));
        let dispatcher = runtime
            .dispatcher(state, AppController::spec(ctx), frontend.clone())
            .unwrap();
        let handle = dispatcher.handle();
        let token = CancellationToken::new();

        let run_token = token.clone();
        let task = tokio::spawn(async move { runtime.run(dispatcher, run_token).await });
        Self {
            frontend,
            handle,
            events,
            token,
            task,
        }
    }

    fn dispatch(&self, action: Action) {
        self.handle.dispatch(action).unwrap();
    }

    async fn wait_until(&self, pred: impl FnMut(&Recording) -> bool) {
        tokio::time::timeout(Duration::from_secs(10), self.frontend.wait_until(pred))
            .await
            .expect("frontend never reached the expected state");
    }

    async fn wait_ready(&self, engine_id: &str) {
        self.wait_until(|r| r.mirror["engines"][engine_id]["ready"] == json!(true))
            .await;
    }

    async fn stop(self) {
        self.token.cancel();
        self.task.await.unwrap().unwrap();
    }
}

fn query_results(r: &Recording) -> Vec<(String, Result<Vec<u8>, String>)> {
    r.publications
        .iter()
        .filter_map(|p| match p {
            Publication::QueryResult {
                query_id, result, ..
            } => Some((query_id.clone(), result.clone())),
            _ => None,
        })
        .collect()
}

fn builtin_config() -> Config {
    Config {
        engine_mode: NewEngineMode::ForceBuiltinWasm,
        chunk_size: 32,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_buffer_trace_loads_and_answers_query() {
    let h = Harness::start(builtin_config());
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "trace.pftrace".into(),
        data: vec![0xAB; 100],
    });
    h.wait_ready("0").await;

    let rec = h.frontend.snapshot();
    assert_eq!(rec.mirror["route"], json!("/viewer"));
    assert_eq!(rec.mirror["engines"]["0"]["mode"], json!("WASM"));
    assert_eq!(
        rec.mirror["engines"]["0"]["source"],
        json!({"type": "ARRAY_BUFFER", "name": "trace.pftrace", "size": 100})
    );
    assert_eq!(rec.patch_errors, 0);

    h.dispatch(Action::ExecuteQuery {
        query_id: "q1".into(),
        engine_id: "0".into(),
        query: "select count(*) from slice".into(),
    });
    h.wait_until(|r| !query_results(r).is_empty() && r.mirror["queries"] == json!({}))
        .await;

    let rec = h.frontend.snapshot();
    assert_eq!(
        query_results(&rec),
        vec![(
            "q1".to_string(),
            Ok(b"100 bytes: select count(*) from slice".to_vec())
        )]
    );
    let statuses = rec
        .publications
        .iter()
        .filter(|p| matches!(p, Publication::Loading { pending: 0 }))
        .count();
    assert!(statuses > 0, "loading counter never returned to zero");
    h.stop().await;
}

#[tokio::test]
async fn test_progress_reported_while_loading() {
    let h = Harness::start(builtin_config());
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "t".into(),
        data: vec![1; 64],
    });
    h.wait_ready("0").await;

    // Two chunks of 32 bytes, then the overlays.
    let rec = h.frontend.snapshot();
    let statuses = rec.statuses();
    assert_eq!(statuses.first(), Some(&"Opening trace"));
    let progress: Vec<_> = statuses
        .iter()
        .filter(|m| m.starts_with("Loading trace "))
        .collect();
    assert_eq!(progress.len(), 2, "{statuses:?}");
    assert!(progress[0].starts_with("Loading trace 50% - "), "{statuses:?}");
    assert!(progress[1].starts_with("Loading trace 100% - "), "{statuses:?}");
    assert!(progress[1].ends_with(" MB/s"), "{statuses:?}");
    assert!(statuses.contains(&"Reading thread list"));
    assert_eq!(statuses.last(), Some(&"Loading overview 100%"));
    assert_eq!(rec.mirror["status"]["message"], json!("Loading overview 100%"));
    h.stop().await;
}

#[tokio::test]
async fn test_unreachable_accelerator_falls_back_to_builtin() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut h = Harness::start(Config {
        engine_mode: NewEngineMode::UseHttpRpcIfAvailable,
        rpc_url: format!("http://{addr}/"),
        rpc_connect_timeout: Duration::from_millis(300),
        ..builtin_config()
    });
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "t".into(),
        data: vec![1; 10],
    });
    h.wait_ready("0").await;

    let rec = h.frontend.snapshot();
    assert_eq!(rec.mirror["engines"]["0"]["mode"], json!("WASM"));

    let selected = std::iter::from_fn(|| h.events.try_recv().ok())
        .find(|ev| ev.kind == EventKind::EngineModeSelected)
        .unwrap();
    assert_eq!(selected.reason.as_deref(), Some("WASM"));
    assert_eq!(selected.engine.as_deref(), Some("0"));
    h.stop().await;
}

#[tokio::test]
async fn test_silent_accelerator_falls_back_after_timeout() {
    let app = Router::new().route(
        "/status",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "late"
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let h = Harness::start(Config {
        engine_mode: NewEngineMode::UseHttpRpcIfAvailable,
        rpc_url: format!("http://{addr}"),
        rpc_connect_timeout: Duration::from_millis(200),
        ..builtin_config()
    });
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "t".into(),
        data: vec![1; 10],
    });
    h.wait_ready("0").await;
    assert_eq!(h.frontend.mirror()["engines"]["0"]["mode"], json!("WASM"));
    h.stop().await;
}

async fn spawn_accelerator() -> String {
    let app = Router::new()
        .route("/status", post(|| async { "ok" }))
        .route("/parse", post(|| async { "" }))
        .route("/notify_eof", post(|| async { "" }))
        .route("/restore_initial_tables", post(|| async { "" }))
        // Bounds unknown: the overview is skipped.
        .route("/trace_bounds", post(|| async { "" }))
        .route(
            "/raw_query",
            post(|body: Bytes| async move {
                if body.as_ref() == b"boom" {
                    Err((StatusCode::INTERNAL_SERVER_ERROR, "query exploded"))
                } else {
                    Ok(format!("rpc: {}", String::from_utf8_lossy(&body)))
                }
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_accelerator_used_when_reachable() {
    let base = spawn_accelerator().await;
    let h = Harness::start(Config {
        engine_mode: NewEngineMode::UseHttpRpcIfAvailable,
        rpc_url: base,
        ..builtin_config()
    });
    h.dispatch(Action::OpenTraceFromHttpRpc);
    h.wait_ready("0").await;
    assert_eq!(h.frontend.mirror()["engines"]["0"]["mode"], json!("HTTP_RPC"));

    h.dispatch(Action::ExecuteQuery {
        query_id: "ok".into(),
        engine_id: "0".into(),
        query: "select 1".into(),
    });
    h.dispatch(Action::ExecuteQuery {
        query_id: "bad".into(),
        engine_id: "0".into(),
        query: "boom".into(),
    });
    h.wait_until(|r| query_results(r).len() == 2 && r.mirror["queries"] == json!({}))
        .await;

    let rec = h.frontend.snapshot();
    let results = query_results(&rec);
    assert!(results.contains(&("ok".to_string(), Ok(b"rpc: select 1".to_vec()))));
    let (_, bad) = results.iter().find(|(id, _)| id == "bad").unwrap();
    assert!(bad.as_ref().unwrap_err().contains("HTTP 500"));

    h.wait_until(|r| r.mirror["engines"]["0"]["failure"] != Value::Null)
        .await;
    h.stop().await;
}

#[tokio::test]
async fn test_loaded_trace_sets_time_and_publishes_overlays() {
    let h = Harness::start(builtin_config());
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "t".into(),
        data: vec![7; 40],
    });
    h.wait_ready("0").await;

    let rec = h.frontend.snapshot();
    assert_eq!(rec.mirror["trace_time"], json!({"start_sec": 0.0, "end_sec": 2.0}));
    assert_eq!(rec.mirror["visible_time"]["start_sec"], json!(0.0));
    assert_eq!(rec.mirror["visible_time"]["end_sec"], json!(2.0));
    assert_eq!(rec.mirror["visible_time"]["resolution"], json!(0.002));

    // Trace time, route and visible window change within one delivered batch.
    let together = rec.batches.iter().any(|batch| {
        let touched = |prefix: &str| batch.iter().any(|p| p.pointer().starts_with(prefix));
        touched("/trace_time") && touched("/route") && touched("/visible_time")
    });
    assert!(together, "post-load actions were split across batches");

    let threads: Vec<_> = rec
        .publications
        .iter()
        .filter_map(|p| match p {
            Publication::Threads { engine_id, data } => Some((engine_id.as_str(), data.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].0, "0");
    assert!(threads[0].1.starts_with(b"40 bytes: select utid"));

    let overview: Vec<(f64, f64)> = rec
        .publications
        .iter()
        .filter_map(|p| match p {
            Publication::Overview {
                start_sec, end_sec, ..
            } => Some((*start_sec, *end_sec)),
            _ => None,
        })
        .collect();
    assert_eq!(overview.len(), 100);
    assert_eq!(overview.first().map(|s| s.0), Some(0.0));
    assert_eq!(overview.last().map(|s| s.1), Some(2.0));
    h.stop().await;
}

#[tokio::test]
async fn test_rpc_source_without_accelerator_reports_failure() {
    let h = Harness::start(builtin_config());
    h.dispatch(Action::OpenTraceFromHttpRpc);
    h.wait_until(|r| {
        r.mirror["status"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("no trace processor reachable"))
    })
    .await;
    assert_eq!(h.frontend.mirror()["engines"]["0"]["ready"], json!(false));
    h.stop().await;
}

#[tokio::test]
async fn test_reopening_replaces_engine_controller() {
    let mut h = Harness::start(builtin_config());
    h.dispatch(Action::OpenTraceFromBuffer {
        name: "first".into(),
        data: vec![1; 8],
    });
    h.wait_ready("0").await;

    h.dispatch(Action::OpenTraceFromBuffer {
        name: "second".into(),
        data: vec![2; 8],
    });
    h.wait_ready("1").await;

    let rec = h.frontend.snapshot();
    assert!(rec.mirror["engines"].get("0").is_none());

    let destroyed: Vec<_> = std::iter::from_fn(|| h.events.try_recv().ok())
        .filter(|ev| ev.kind == EventKind::ControllerDestroyed)
        .filter_map(|ev| ev.controller.as_deref().map(str::to_string))
        .collect();
    assert_eq!(destroyed, vec!["0".to_string()]);
    h.stop().await;
}
