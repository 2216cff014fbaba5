use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::loading::LoadingTracker;
use super::method::{EngineMethod, EngineMode, EngineRequest, TraceSpan};
use super::transport::Transport;
use crate::deferred::{Deferred, Resolver, deferred};
use crate::error::EngineError;
use crate::events::{Bus, Event, EventKind};

struct Queued {
    request: EngineRequest,
    resolver: Resolver<Vec<u8>, EngineError>,
}

struct Shared {
    id: Arc<str>,
    mode: EngineMode,
    next_id: AtomicU64,
    pending: AtomicUsize,
    /// Set once; the error that stopped the engine.
    dead: Mutex<Option<EngineError>>,
    tracker: Option<Arc<dyn LoadingTracker>>,
    bus: Option<Bus>,
    stop: CancellationToken,
}

impl Shared {
    fn dead(&self) -> MutexGuard<'_, Option<EngineError>> {
        self.dead.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejection handed to every request once the engine is dead.
    fn rejection(&self) -> Option<EngineError> {
        self.dead().as_ref().map(|cause| match cause {
            EngineError::Aborted { .. } => cause.clone(),
            other => EngineError::aborted(other.to_string()),
        })
    }

    /// Marks the engine dead; returns false if it already was.
    fn kill(&self, cause: EngineError) -> bool {
        let mut dead = self.dead();
        if dead.is_some() {
            return false;
        }
        *dead = Some(cause);
        true
    }

    fn begin(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        if let Some(t) = &self.tracker {
            t.begin_loading();
        }
    }

    fn end(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        if let Some(t) = &self.tracker {
            t.end_loading();
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_engine(Arc::clone(&self.id)));
        }
    }
}

/// Strictly ordered request queue in front of one engine.
///
/// Requests are sent one at a time in submission order; each settles its own
/// deferred. A failed request does not stop the queue. Once the engine is
/// aborted every queued and future request rejects without reaching the
/// transport.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Queued>,
}

impl Engine {
    /// Starts configuring an engine over `transport`.
    pub fn builder(id: impl Into<Arc<str>>, transport: impl Transport) -> EngineBuilder {
        EngineBuilder {
            id: id.into(),
            transport: Box::new(transport),
            bus: None,
            tracker: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn mode(&self) -> EngineMode {
        self.shared.mode
    }

    /// Requests submitted and not yet settled.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }

    /// Whether the engine stopped accepting requests.
    pub fn is_aborted(&self) -> bool {
        self.shared.dead().is_some()
    }

    /// The error that stopped the engine, if any.
    pub fn failure(&self) -> Option<EngineError> {
        self.shared.dead().clone()
    }

    /// Queues a request. Never blocks.
    pub fn submit(&self, method: EngineMethod, data: Vec<u8>) -> Deferred<Vec<u8>, EngineError> {
        let (resolver, deferred) = deferred();
        if let Some(rejection) = self.shared.rejection() {
            resolver.reject(rejection);
            return deferred;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.begin();
        let queued = Queued {
            request: EngineRequest { id, method, data },
            resolver,
        };
        if let Err(mpsc::error::SendError(queued)) = self.tx.send(queued) {
            self.shared.end();
            queued.resolver.reject(EngineError::Closed);
        }
        deferred
    }

    /// Feeds one chunk of trace data.
    pub fn parse(&self, chunk: Vec<u8>) -> Deferred<Vec<u8>, EngineError> {
        self.submit(EngineMethod::Parse, chunk)
    }

    /// Signals that no more trace data follows.
    pub fn notify_eof(&self) -> Deferred<Vec<u8>, EngineError> {
        self.submit(EngineMethod::NotifyEof, Vec::new())
    }

    /// Runs `sql`; the response bytes are returned as produced by the engine.
    pub fn query(&self, sql: &str) -> Deferred<Vec<u8>, EngineError> {
        self.submit(EngineMethod::RawQuery, sql.as_bytes().to_vec())
    }

    pub fn compute_metric(&self, metric: &str) -> Deferred<Vec<u8>, EngineError> {
        self.submit(EngineMethod::ComputeMetric, metric.as_bytes().to_vec())
    }

    pub fn restore_initial_tables(&self) -> Deferred<Vec<u8>, EngineError> {
        self.submit(EngineMethod::RestoreInitialTables, Vec::new())
    }

    /// Asks for the time span of the loaded trace.
    ///
    /// Queued at call time, like every other request.
    pub fn trace_bounds(&self) -> impl Future<Output = Result<TraceSpan, EngineError>> + Send + 'static {
        let pending = self.submit(EngineMethod::TraceBounds, Vec::new());
        async move { TraceSpan::decode(&pending.await?) }
    }

    /// Stops the engine: queued and later requests reject, the request in
    /// flight (if any) still completes.
    pub fn shutdown(&self) {
        if self.shared.kill(EngineError::aborted("engine shut down")) {
            tracing::debug!(engine = %self.shared.id, "engine shut down");
        }
        self.shared.stop.cancel();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.shared.id)
            .field("mode", &self.shared.mode)
            .field("pending", &self.pending())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Builder returned by [`Engine::builder`].
pub struct EngineBuilder {
    id: Arc<str>,
    transport: Box<dyn Transport>,
    bus: Option<Bus>,
    tracker: Option<Arc<dyn LoadingTracker>>,
}

impl EngineBuilder {
    /// Publishes failures and aborts on `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Reports outstanding requests to `tracker`.
    pub fn tracker(mut self, tracker: Arc<dyn LoadingTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Spawns the queue loop on the current tokio runtime.
    pub fn spawn(self) -> Engine {
        let shared = Arc::new(Shared {
            id: self.id,
            mode: self.transport.mode(),
            next_id: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            dead: Mutex::new(None),
            tracker: self.tracker,
            bus: self.bus,
            stop: CancellationToken::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive_queue(Arc::clone(&shared), self.transport, rx));
        Engine { shared, tx }
    }
}

async fn drive_queue(
    shared: Arc<Shared>,
    mut transport: Box<dyn Transport>,
    mut rx: mpsc::UnboundedReceiver<Queued>,
) {
    loop {
        let next = tokio::select! {
            biased;
            next = rx.recv() => next,
            _ = shared.stop.cancelled() => None,
        };
        let Some(Queued { request, resolver }) = next else {
            break;
        };
        let (id, method) = (request.id, request.method);

        let outcome = match shared.rejection() {
            Some(rejection) => Err(rejection),
            None => transport.round_trip(request).await,
        };
        if let Err(e) = &outcome {
            report_failure(&shared, id, method, e);
        }
        shared.end();
        resolver.settle(outcome);
    }

    rx.close();
    while let Ok(Queued { resolver, .. }) = rx.try_recv() {
        shared.end();
        resolver.reject(shared.rejection().unwrap_or(EngineError::Closed));
    }
    tracing::debug!(engine = %shared.id, "engine queue stopped");
}

fn report_failure(shared: &Shared, id: u64, method: EngineMethod, e: &EngineError) {
    match e {
        EngineError::Aborted { reason } => {
            if shared.kill(e.clone()) {
                tracing::error!(engine = %shared.id, request = id, %method, %reason, "engine aborted");
                shared.publish(Event::new(EventKind::EngineAborted).with_reason(reason.as_str()));
            }
        }
        EngineError::ProtocolViolation { .. } => {
            tracing::error!(engine = %shared.id, request = id, %method, error = %e, "engine protocol violation");
            if shared.kill(e.clone()) {
                shared.publish(Event::new(EventKind::EngineAborted).with_reason(e.to_string()));
            }
        }
        EngineError::Failed { reason } => {
            tracing::warn!(engine = %shared.id, request = id, %method, %reason, "engine request failed");
            shared.publish(
                Event::new(EventKind::EngineRequestFailed)
                    .with_request(id)
                    .with_action(method.as_str())
                    .with_reason(reason.as_str()),
            );
        }
        EngineError::Closed => {}
    }
}
