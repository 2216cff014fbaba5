use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::task::JoinHandle;

use super::AppContext;
use super::query::QueryController;
use crate::app::stream::open_stream;
use crate::app::{Action, TraceApp, TraceSource, TraceTime, VisibleTime};
use crate::controller::{ChildSpec, Children, Controller, LocalState, Mount, RunContext};
use crate::core::NewEngineMode;
use crate::dispatch::DispatchHandle;
use crate::engine::{
    BridgeTransport, Engine, EngineMode, HttpTransport, PublishingTracker, TraceSpan,
    check_connection,
};
use crate::error::{ControllerError, EngineError, TraceLoadError};
use crate::events::{Bus, Event, EventKind};
use crate::frontend::{Publication, Publisher};

/// Slices the timeline overview is computed in.
const OVERVIEW_STEPS: u32 = 100;

const THREADS_QUERY: &str = "select utid, tid, pid, thread.name, process.name \
     from thread left join process using(upid) order by utid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    LoadingTrace,
    Ready,
}

type EngineSlot = Arc<Mutex<Option<Engine>>>;

/// Owns one engine: picks its transport, loads the trace into it and, once
/// ready, runs the queries addressed to it.
pub struct TraceController {
    engine_id: String,
    ctx: AppContext,
    phase: LocalState<Phase>,
    engine: EngineSlot,
    loader: Option<JoinHandle<()>>,
}

impl TraceController {
    pub fn spec(engine_id: &str, ctx: AppContext) -> ChildSpec<TraceApp> {
        ChildSpec::new(
            engine_id,
            |(engine_id, ctx): (String, AppContext), mount: &Mount| TraceController {
                engine_id,
                ctx,
                phase: mount.state(Phase::Init),
                engine: EngineSlot::default(),
                loader: None,
            },
            (engine_id.to_string(), ctx),
        )
    }

    fn engine(&self) -> Option<Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn start_loading(&mut self, cx: &RunContext<'_, TraceApp>, source: TraceSource) {
        let loader = Loader {
            engine_id: self.engine_id.clone(),
            source,
            mode: cx.state().new_engine_mode,
            ctx: self.ctx.clone(),
            dispatch: cx.dispatcher().clone(),
            publisher: cx.publisher().clone(),
            bus: cx.bus().clone(),
            slot: Arc::clone(&self.engine),
        };
        self.loader = Some(tokio::spawn(loader.run()));
    }
}

impl Controller<TraceApp> for TraceController {
    fn run(&mut self, cx: &RunContext<'_, TraceApp>) -> Result<Children<TraceApp>, ControllerError> {
        let Some(cfg) = cx.state().engine(&self.engine_id) else {
            return Err(ControllerError::invariant(format!(
                "engine {} is not in the state",
                self.engine_id
            )));
        };
        if let Some(fatal) = self.engine().and_then(|e| e.failure()).filter(EngineError::is_fatal) {
            return Err(ControllerError::invariant(format!(
                "engine {}: {fatal}",
                self.engine_id
            )));
        }

        let phase = **self.phase.get();
        match phase {
            Phase::Init => {
                cx.dispatch(Action::status("Opening trace"));
                cx.publisher().status("Opening trace");
                self.start_loading(cx, cfg.source.clone());
                self.phase.set(Phase::LoadingTrace)?;
                Ok(None)
            }
            Phase::LoadingTrace => {
                // Stays here until the loader marks the engine ready.
                if cfg.ready && self.engine().is_some() {
                    self.phase.set(Phase::Ready)?;
                }
                Ok(None)
            }
            Phase::Ready => {
                let Some(engine) = self.engine() else {
                    return Err(ControllerError::invariant("ready without an engine"));
                };
                let children = cx
                    .state()
                    .queries_for(&self.engine_id)
                    .map(|q| QueryController::spec(&q.id, engine.clone()))
                    .collect();
                Ok(Some(children))
            }
        }
    }

    fn on_destroy(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        if let Some(engine) = self.engine() {
            engine.shutdown();
        }
    }
}

/// Spawned once per engine; reports back through actions only.
struct Loader {
    engine_id: String,
    source: TraceSource,
    mode: NewEngineMode,
    ctx: AppContext,
    dispatch: DispatchHandle<Action>,
    publisher: Publisher,
    bus: Bus,
    slot: EngineSlot,
}

impl Loader {
    async fn run(self) {
        match self.load().await {
            Ok(mode) => {
                tracing::info!(engine = %self.engine_id, mode = mode.as_str(), "trace loaded");
            }
            Err(e) => {
                tracing::warn!(engine = %self.engine_id, error = %e, "trace load failed");
                self.status(e.to_string());
                let on_rpc = self
                    .slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .is_some_and(|engine| engine.mode() == EngineMode::HttpRpc);
                if on_rpc {
                    self.dispatch(Action::SetEngineFailed {
                        engine_id: self.engine_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn load(&self) -> Result<EngineMode, TraceLoadError> {
        self.status("Creating trace processor");
        let engine = self.create_engine().await?;
        let mode = engine.mode();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(engine.clone());

        self.bus.publish(
            Event::new(EventKind::EngineModeSelected)
                .with_engine(self.engine_id.as_str())
                .with_reason(mode.as_str()),
        );
        self.dispatch(Action::SetEngineReady {
            engine_id: self.engine_id.clone(),
            ready: false,
            mode,
        });

        match open_stream(&self.source, self.ctx.config().chunk_size_clamped()) {
            Some(mut stream) => {
                let started = Instant::now();
                loop {
                    let chunk = stream.read_chunk().await?;
                    let secs = started.elapsed().as_secs_f64().max(1e-3);
                    let rate = (chunk.bytes_read as f64 / secs / 1e6).ceil();
                    let status = format!("{} - {rate} MB/s", chunk.progress());
                    let eof = chunk.eof;

                    engine.parse(chunk.data).await?;
                    self.status(status);
                    if eof {
                        break;
                    }
                }
                engine.notify_eof().await?;
            }
            // The accelerator was started with the trace already loaded.
            None if mode == EngineMode::HttpRpc => {
                engine.restore_initial_tables().await?;
            }
            None => {
                return Err(EngineError::failed(format!(
                    "no trace processor reachable at {}",
                    self.ctx.config().rpc_base()
                ))
                .into());
            }
        }

        let span = engine.trace_bounds().await?;
        let trace_time = TraceTime::from(span);
        self.dispatch_all(vec![
            Action::SetTraceTime { time: trace_time },
            Action::Navigate {
                route: "/viewer".to_string(),
            },
            Action::SetVisibleTraceTime {
                time: VisibleTime::whole(trace_time),
            },
        ]);

        self.list_threads(&engine).await?;
        self.load_overview(&engine, span).await?;

        self.dispatch(Action::SetEngineReady {
            engine_id: self.engine_id.clone(),
            ready: true,
            mode,
        });
        Ok(mode)
    }

    async fn create_engine(&self) -> Result<Engine, EngineError> {
        let cfg = self.ctx.config();
        let use_rpc = match self.mode {
            NewEngineMode::ForceBuiltinWasm => false,
            NewEngineMode::UseHttpRpcIfAvailable => {
                match check_connection(cfg.rpc_base(), cfg.rpc_connect_timeout).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(url = cfg.rpc_base(), error = %e, "no trace processor accelerator");
                        false
                    }
                }
            }
        };

        let builder = if use_rpc {
            tracing::info!(engine = %self.engine_id, url = cfg.rpc_base(), "opening trace using native accelerator over HTTP+RPC");
            Engine::builder(self.engine_id.as_str(), HttpTransport::new(cfg.rpc_base())?)
        } else {
            tracing::info!(engine = %self.engine_id, "opening trace using built-in engine");
            let transport = BridgeTransport::spawn_worker(self.ctx.new_processor());
            Engine::builder(self.engine_id.as_str(), transport)
        };
        Ok(builder
            .bus(self.bus.clone())
            .tracker(Arc::new(PublishingTracker::new(self.publisher.clone())))
            .spawn())
    }

    async fn list_threads(&self, engine: &Engine) -> Result<(), EngineError> {
        self.status("Reading thread list");
        let data = engine.query(THREADS_QUERY).await?;
        self.publisher.publish(Publication::Threads {
            engine_id: self.engine_id.clone(),
            data,
        });
        Ok(())
    }

    /// Publishes per-CPU load for each slice of the trace. Traces without
    /// scheduling data get one per-process summary of slice durations instead.
    async fn load_overview(&self, engine: &Engine, span: TraceSpan) -> Result<(), EngineError> {
        if span.is_empty() {
            return Ok(());
        }
        let step_ns = (span.end_ns - span.start_ns) as f64 / f64::from(OVERVIEW_STEPS);
        let step_sec = step_ns / 1e9;
        let mut has_sched = false;

        for step in 0..OVERVIEW_STEPS {
            let done = (f64::from(step + 1) / f64::from(OVERVIEW_STEPS) * 1000.0).round() / 10.0;
            self.status(format!("Loading overview {done}%"));

            let start_ns = span.start_ns + (step_ns * f64::from(step)).floor() as i64;
            let end_ns = span.start_ns + (step_ns * f64::from(step + 1)).ceil() as i64;
            let data = engine
                .query(&format!(
                    "select sum(dur) / {step_sec} / 1e9, cpu from sched \
                     where ts >= {start_ns} and ts < {end_ns} and utid != 0 \
                     group by cpu order by cpu"
                ))
                .await?;
            has_sched |= !data.is_empty();
            self.publisher.publish(Publication::Overview {
                engine_id: self.engine_id.clone(),
                start_sec: start_ns as f64 / 1e9,
                end_sec: end_ns as f64 / 1e9,
                data,
            });
        }
        if has_sched {
            return Ok(());
        }

        let step_ns = step_ns.ceil() as i64;
        let data = engine
            .query(&format!(
                "select bucket, upid, sum(utid_sum) / cast({step_ns} as float) as upid_sum \
                 from thread inner join ( \
                   select cast((ts - {start}) / {step_ns} as int) as bucket, sum(dur) as utid_sum, utid \
                   from slice inner join thread_track on slice.track_id = thread_track.id \
                   group by bucket, utid \
                 ) using(utid) group by bucket, upid",
                start = span.start_ns
            ))
            .await?;
        self.publisher.publish(Publication::Overview {
            engine_id: self.engine_id.clone(),
            start_sec: span.start_sec(),
            end_sec: span.end_sec(),
            data,
        });
        Ok(())
    }

    /// Stores the status line and pushes it to the frontend right away.
    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        self.publisher.status(message.as_str());
        self.dispatch(Action::status(message));
    }

    fn dispatch(&self, action: Action) {
        self.dispatch_all(vec![action]);
    }

    fn dispatch_all(&self, actions: Vec<Action>) {
        if self.dispatch.dispatch_all(actions).is_err() {
            tracing::debug!(engine = %self.engine_id, "loader result dropped, dispatcher closed");
        }
    }
}
