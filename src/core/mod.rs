//! Runtime core: configuration and the top-level driver.
//!
//! - [`Config`]: iteration ceiling, bus capacity and engine transport settings;
//! - [`Runtime`]: owns the event bus and subscribers and drives a dispatcher
//!   until cancellation, a termination signal or a fatal error;
//! - `shutdown`: OS signal handling used by [`Runtime::run`].

mod builder;
mod config;
mod runtime;
mod shutdown;

pub use builder::RuntimeBuilder;
pub use config::{Config, DEFAULT_MAX_ITERATIONS, NewEngineMode};
pub use runtime::Runtime;
