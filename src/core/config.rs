//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the dispatcher, the event bus and
//! engine transport selection.
//!
//! ## Sentinel values
//! - `max_iterations = 0` → default ceiling ([`DEFAULT_MAX_ITERATIONS`])
//! - `bus_capacity = 0` → clamped to 1
//! - `chunk_size = 0` → clamped to 1

use std::time::Duration;

use serde::Serialize;

/// Iteration ceiling used when `max_iterations` is left at `0`.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Which transport a newly created engine should use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewEngineMode {
    /// Probe the external HTTP accelerator and fall back to the built-in engine.
    #[default]
    UseHttpRpcIfAvailable,
    /// Always host the engine behind the worker bridge.
    ForceBuiltinWasm,
}

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `max_iterations`: dispatch loop ceiling before a livelock is declared (`0` = default)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `rpc_url`: base url of the external HTTP accelerator
/// - `rpc_connect_timeout`: bound on accelerator discovery only
/// - `chunk_size`: bytes per trace chunk fed to the engine (min 1)
/// - `engine_mode`: initial transport preference copied into the app state
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum dispatch loop iterations per cycle.
    pub max_iterations: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Base url of the external trace processor (`{rpc_url}/status`, `{rpc_url}/parse`, ...).
    pub rpc_url: String,

    /// Timeout of the `/status` probe used for accelerator discovery.
    pub rpc_connect_timeout: Duration,

    /// Maximum size of one trace chunk.
    pub chunk_size: usize,

    /// Initial transport preference.
    pub engine_mode: NewEngineMode,
}

impl Config {
    /// Returns the effective iteration ceiling.
    #[inline]
    pub fn iteration_ceiling(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a chunk size clamped to a minimum of 1.
    #[inline]
    pub fn chunk_size_clamped(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// `rpc_url` without a trailing slash.
    #[inline]
    pub fn rpc_base(&self) -> &str {
        self.rpc_url.trim_end_matches('/')
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_iterations = 100`
    /// - `bus_capacity = 1024`
    /// - `rpc_url = http://127.0.0.1:9001`
    /// - `rpc_connect_timeout = 2s`
    /// - `chunk_size = 32 MiB`
    /// - `engine_mode = UseHttpRpcIfAvailable`
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            bus_capacity: 1024,
            rpc_url: "http://127.0.0.1:9001".to_string(),
            rpc_connect_timeout: Duration::from_secs(2),
            chunk_size: 32 * 1024 * 1024,
            engine_mode: NewEngineMode::default(),
        }
    }
}
