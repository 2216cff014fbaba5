use std::sync::Arc;

use super::spec::ControllerId;
use crate::dispatch::{DispatchHandle, Model};
use crate::events::Bus;
use crate::frontend::{Publication, Publisher};

/// Handles shared by every controller of one tree.
pub(crate) struct TreeEnv<M: Model> {
    pub(crate) dispatch: DispatchHandle<M::Action>,
    pub(crate) publisher: Publisher,
    pub(crate) bus: Bus,
}

impl<M: Model> Clone for TreeEnv<M> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
            publisher: self.publisher.clone(),
            bus: self.bus.clone(),
        }
    }
}

/// What a controller sees during `run()`.
///
/// The state snapshot is identical for every controller invoked in the same
/// loop iteration.
pub struct RunContext<'a, M: Model> {
    id: &'a ControllerId,
    state: &'a Arc<M::State>,
    env: &'a TreeEnv<M>,
}

impl<'a, M: Model> RunContext<'a, M> {
    pub(crate) fn new(id: &'a ControllerId, state: &'a Arc<M::State>, env: &'a TreeEnv<M>) -> Self {
        Self { id, state, env }
    }

    /// Id of the running controller.
    pub fn id(&self) -> &ControllerId {
        self.id
    }

    /// Current application state.
    pub fn state(&self) -> &Arc<M::State> {
        self.state
    }

    /// Handle for enqueueing actions; cloneable into spawned work.
    pub fn dispatcher(&self) -> &DispatchHandle<M::Action> {
        &self.env.dispatch
    }

    /// Enqueues an action for the next loop iteration.
    ///
    /// A closed dispatcher is ignored (the host is shutting down).
    pub fn dispatch(&self, action: M::Action) {
        if self.env.dispatch.dispatch(action).is_err() {
            tracing::debug!(controller = %self.id, "dispatch from controller after dispatcher closed");
        }
    }

    /// Out-of-band channel to the frontend.
    pub fn publisher(&self) -> &Publisher {
        &self.env.publisher
    }

    /// Shorthand for `publisher().publish(..)`.
    pub fn publish(&self, publication: Publication) {
        self.env.publisher.publish(publication);
    }

    /// Runtime event bus.
    pub fn bus(&self) -> &Bus {
        &self.env.bus
    }
}
