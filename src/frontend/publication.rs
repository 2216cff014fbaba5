use std::time::Duration;

/// Fixed set of out-of-band payload kinds.
///
/// Query results, the timeline overlays (thread list and overview) and
/// status lines, plus the engines' loading counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishKind {
    QueryResult,
    Threads,
    Overview,
    Loading,
    Status,
}

impl PublishKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishKind::QueryResult => "query_result",
            PublishKind::Threads => "threads",
            PublishKind::Overview => "overview",
            PublishKind::Loading => "loading",
            PublishKind::Status => "status",
        }
    }
}

/// A named payload pushed to the frontend outside of state patches.
#[derive(Debug, Clone, PartialEq)]
pub enum Publication {
    /// Outcome of one query run by a query controller.
    QueryResult {
        query_id: String,
        query: String,
        /// Wall time from submission to response.
        duration: Duration,
        /// Raw engine response, or the rejection message.
        result: Result<Vec<u8>, String>,
    },
    /// Thread list of a freshly loaded trace, as returned by the engine.
    Threads { engine_id: String, data: Vec<u8> },
    /// Load summary of one slice of the timeline.
    Overview {
        engine_id: String,
        start_sec: f64,
        end_sec: f64,
        data: Vec<u8>,
    },
    /// Number of engine requests still outstanding.
    Loading { pending: usize },
    /// Free-form status line.
    Status { message: String },
}

impl Publication {
    pub fn kind(&self) -> PublishKind {
        match self {
            Publication::QueryResult { .. } => PublishKind::QueryResult,
            Publication::Threads { .. } => PublishKind::Threads,
            Publication::Overview { .. } => PublishKind::Overview,
            Publication::Loading { .. } => PublishKind::Loading,
            Publication::Status { .. } => PublishKind::Status,
        }
    }
}
