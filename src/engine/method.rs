use std::fmt;

use crate::error::EngineError;

use serde::Serialize;

/// Remote procedures understood by a trace processing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineMethod {
    /// Submit one chunk of trace data.
    Parse,
    /// Signal the end of the trace input.
    NotifyEof,
    /// Run a query.
    RawQuery,
    /// Compute an aggregate metric.
    ComputeMetric,
    /// Drop state derived from queries, keeping the loaded trace.
    RestoreInitialTables,
    /// Time span covered by the loaded trace, encoded as a [`TraceSpan`].
    TraceBounds,
}

impl EngineMethod {
    /// Wire name (also the HTTP endpoint path).
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMethod::Parse => "parse",
            EngineMethod::NotifyEof => "notify_eof",
            EngineMethod::RawQuery => "raw_query",
            EngineMethod::ComputeMetric => "compute_metric",
            EngineMethod::RestoreInitialTables => "restore_initial_tables",
            EngineMethod::TraceBounds => "trace_bounds",
        }
    }
}

impl fmt::Display for EngineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport an engine talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineMode {
    /// Built-in engine hosted behind the worker bridge.
    Wasm,
    /// External accelerator reached over HTTP.
    HttpRpc,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Wasm => "WASM",
            EngineMode::HttpRpc => "HTTP_RPC",
        }
    }
}

/// One outbound engine request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Monotonically increasing per engine.
    pub id: u64,
    pub method: EngineMethod,
    pub data: Vec<u8>,
}

/// First and last timestamp of a trace, in nanoseconds.
///
/// Wire form: empty (bounds unknown) or 16 bytes, start then end, each a
/// big-endian `i64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSpan {
    pub start_ns: i64,
    pub end_ns: i64,
}

impl TraceSpan {
    pub fn new(start_ns: i64, end_ns: i64) -> Self {
        Self { start_ns, end_ns }
    }

    pub fn is_empty(&self) -> bool {
        self.end_ns <= self.start_ns
    }

    pub fn start_sec(&self) -> f64 {
        self.start_ns as f64 / 1e9
    }

    pub fn end_sec(&self) -> f64 {
        self.end_ns as f64 / 1e9
    }

    pub fn duration_sec(&self) -> f64 {
        self.end_sec() - self.start_sec()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.start_ns.to_be_bytes());
        out.extend_from_slice(&self.end_ns.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let (Some(start), Some(end)) = (
            bytes.get(..8).and_then(|b| <[u8; 8]>::try_from(b).ok()),
            bytes.get(8..).and_then(|b| <[u8; 8]>::try_from(b).ok()),
        ) else {
            return Err(EngineError::failed(format!(
                "malformed trace bounds: {} bytes",
                bytes.len()
            )));
        };
        let span = Self::new(i64::from_be_bytes(start), i64::from_be_bytes(end));
        if span.end_ns < span.start_ns {
            return Err(EngineError::failed(format!(
                "trace bounds end before they start: {}..{}",
                span.start_ns, span.end_ns
            )));
        }
        Ok(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_decodes_big_endian_pair() {
        let span = TraceSpan::new(1_500_000_000, 4_000_000_000);
        assert_eq!(TraceSpan::decode(&span.encode()), Ok(span));
        assert_eq!(span.duration_sec(), 2.5);
    }

    #[test]
    fn test_empty_reply_means_unknown_bounds() {
        let span = TraceSpan::decode(&[]).unwrap();
        assert!(span.is_empty());
    }

    #[test]
    fn test_malformed_bounds_rejected() {
        let err = TraceSpan::decode(&[0; 9]).unwrap_err();
        assert_eq!(err.as_label(), "engine_failed");

        let backwards = TraceSpan::new(10, 5).encode();
        assert!(TraceSpan::decode(&backwards).is_err());
    }
}
