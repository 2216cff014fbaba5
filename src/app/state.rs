use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::core::NewEngineMode;
use crate::engine::{EngineMode, TraceSpan};

/// Where an engine reads its trace from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceSource {
    File {
        path: String,
    },
    /// In-memory bytes. Only the name and size reach the frontend.
    ArrayBuffer {
        name: String,
        size: usize,
        #[serde(skip)]
        data: Arc<Vec<u8>>,
    },
    Url {
        url: String,
    },
    /// The accelerator already holds a trace; nothing is streamed.
    HttpRpc,
}

impl TraceSource {
    pub fn buffer(name: impl Into<String>, data: Vec<u8>) -> Self {
        TraceSource::ArrayBuffer {
            name: name.into(),
            size: data.len(),
            data: Arc::new(data),
        }
    }
}

/// One trace engine as seen by the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    pub id: String,
    pub source: TraceSource,
    /// Set once the whole trace has been handed to the engine.
    pub ready: bool,
    /// Transport picked for this engine, known once loading starts.
    pub mode: Option<EngineMode>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryConfig {
    pub id: String,
    pub engine_id: String,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub message: String,
    /// Seconds since the unix epoch.
    pub timestamp: u64,
}

/// Time span covered by the loaded trace, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TraceTime {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl TraceTime {
    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

impl From<TraceSpan> for TraceTime {
    fn from(span: TraceSpan) -> Self {
        Self {
            start_sec: span.start_sec(),
            end_sec: span.end_sec(),
        }
    }
}

/// Part of the timeline currently on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VisibleTime {
    pub start_sec: f64,
    pub end_sec: f64,
    /// Seconds per pixel.
    pub resolution: f64,
    /// Seconds since the unix epoch.
    pub last_update: u64,
}

impl VisibleTime {
    /// The whole trace, before the view has reported its width.
    ///
    /// The resolution assumes a 1000 pixel wide timeline.
    pub fn whole(trace: TraceTime) -> Self {
        Self {
            start_sec: trace.start_sec,
            end_sec: trace.end_sec,
            resolution: trace.duration_sec() / 1000.0,
            last_update: unix_now(),
        }
    }
}

/// Application state of the trace viewer.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub route: Option<String>,
    pub new_engine_mode: NewEngineMode,
    pub engines: BTreeMap<String, EngineState>,
    pub queries: BTreeMap<String, QueryConfig>,
    pub status: Status,
    pub trace_time: TraceTime,
    pub visible_time: VisibleTime,
    /// Counter used to mint engine ids.
    pub next_id: u64,
}

impl State {
    pub fn new(new_engine_mode: NewEngineMode) -> Self {
        Self {
            route: None,
            new_engine_mode,
            engines: BTreeMap::new(),
            queries: BTreeMap::new(),
            status: Status::default(),
            trace_time: TraceTime::default(),
            visible_time: VisibleTime::default(),
            next_id: 0,
        }
    }

    pub fn engine(&self, id: &str) -> Option<&EngineState> {
        self.engines.get(id)
    }

    /// Queries addressed to `engine_id`, in id order.
    pub fn queries_for<'a>(&'a self, engine_id: &'a str) -> impl Iterator<Item = &'a QueryConfig> + 'a {
        self.queries.values().filter(move |q| q.engine_id == engine_id)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

impl Default for State {
    fn default() -> Self {
        Self::new(NewEngineMode::default())
    }
}
