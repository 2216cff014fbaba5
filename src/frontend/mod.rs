//! # Upward boundary towards the view layer.
//!
//! The dispatcher delivers one ordered patch batch per quiescent cycle through
//! [`Frontend::patch_state`]; controllers and engines push out-of-band payloads
//! through a [`Publisher`].
//!
//! Implementations:
//! - [`RemoteFrontend`] forwards both over a [`Remote`](crate::remote::Remote) proxy.
//! - [`RecordingFrontend`] mirrors the state and keeps every payload in memory.

mod publication;
mod recording;
mod remote;

use std::sync::Arc;

use crate::dispatch::Patch;

pub use publication::{PublishKind, Publication};
pub use recording::{Recording, RecordingFrontend};
pub use remote::{FrontendCall, FrontendHandler, RemoteFrontend};

/// Receiver of state patches and published payloads.
pub trait Frontend: Send + Sync {
    /// Applies one atomic, ordered patch batch.
    fn patch_state(&self, patches: Vec<Patch>);

    /// Delivers an out-of-band payload.
    fn publish(&self, publication: Publication);
}

/// Cloneable publishing handle passed to controllers and engines.
#[derive(Clone)]
pub struct Publisher {
    frontend: Arc<dyn Frontend>,
}

impl Publisher {
    pub fn new(frontend: Arc<dyn Frontend>) -> Self {
        Self { frontend }
    }

    pub fn publish(&self, publication: Publication) {
        tracing::trace!(kind = publication.kind().as_str(), "publish");
        self.frontend.publish(publication);
    }

    /// Shorthand for a [`Publication::Status`].
    pub fn status(&self, message: impl Into<String>) {
        self.publish(Publication::Status {
            message: message.into(),
        });
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
