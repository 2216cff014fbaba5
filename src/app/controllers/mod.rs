//! # Controllers of the trace viewer.
//!
//! ```text
//! AppController ("app")
//!   └── TraceController (one per engine id)
//!         Init ──spawn loader──► LoadingTrace ──engine ready──► Ready
//!                                                               └── QueryController (one per query of this engine)
//! ```
//!
//! Async work (probing the accelerator, streaming the trace, running
//! queries) runs on spawned tasks; results come back as dispatched
//! [`Action`](super::Action)s.

mod app;
mod query;
mod trace;

use std::sync::Arc;

use crate::core::Config;
use crate::engine::TraceProcessor;

pub use app::AppController;
pub use query::QueryController;
pub use trace::TraceController;

/// Builds the processor hosted behind a worker bridge, once per engine.
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn TraceProcessor> + Send + Sync>;

/// Dependencies shared by every controller of the app tree.
#[derive(Clone)]
pub struct AppContext {
    cfg: Arc<Config>,
    processors: ProcessorFactory,
}

impl AppContext {
    pub fn new<F>(cfg: Config, processors: F) -> Self
    where
        F: Fn() -> Box<dyn TraceProcessor> + Send + Sync + 'static,
    {
        Self {
            cfg: Arc::new(cfg),
            processors: Arc::new(processors),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub(crate) fn new_processor(&self) -> Box<dyn TraceProcessor> {
        (self.processors)()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}
