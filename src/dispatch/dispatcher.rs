use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::action::{Action, Model};
use super::handle::DispatchHandle;
use super::patch::{Patch, diff};
use crate::controller::{ChildSpec, ControllerId, ControllerNode, TreeEnv};
use crate::core::Config;
use crate::error::{ActionError, DispatchError};
use crate::events::{Bus, Event, EventKind};
use crate::frontend::{Frontend, Publisher};

/// Outcome of one settle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    /// Loop iterations executed.
    pub iterations: usize,
    /// Patches delivered to the frontend.
    pub patches: usize,
}

/// Owns the state and the controller tree and runs them to quiescence.
///
/// `&mut self` on every entry point plays the part of the loop's reentrancy
/// flag: anything dispatched while a cycle is running goes through a
/// [`DispatchHandle`] and is picked up by a later iteration of that cycle.
///
/// A fatal error poisons the dispatcher: state may already have moved past
/// what the frontend saw, so every later call returns the same error without
/// running a cycle.
pub struct Dispatcher<M: Model> {
    max_iterations: usize,
    state: Arc<M::State>,
    snapshot: Value,
    root: ControllerNode<M>,
    queue: VecDeque<M::Action>,
    rx: mpsc::UnboundedReceiver<Vec<M::Action>>,
    env: TreeEnv<M>,
    frontend: Arc<dyn Frontend>,
    failure: Option<DispatchError>,
}

impl<M: Model> Dispatcher<M> {
    /// Mounts `root` over `initial`. The tree is not invoked until the first cycle.
    pub fn new(
        cfg: &Config,
        initial: M::State,
        root: ChildSpec<M>,
        frontend: Arc<dyn Frontend>,
        bus: Bus,
    ) -> Result<Self, DispatchError> {
        let snapshot =
            serde_json::to_value(&initial).map_err(|e| DispatchError::Snapshot(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            max_iterations: cfg.iteration_ceiling(),
            state: Arc::new(initial),
            snapshot,
            root: ControllerNode::mount(root),
            queue: VecDeque::new(),
            rx,
            env: TreeEnv {
                dispatch: DispatchHandle::new(tx),
                publisher: Publisher::new(Arc::clone(&frontend)),
                bus,
            },
            frontend,
            failure: None,
        })
    }

    /// Handle for enqueueing actions from outside the loop.
    pub fn handle(&self) -> DispatchHandle<M::Action> {
        self.env.dispatch.clone()
    }

    /// Current state snapshot.
    pub fn state(&self) -> &Arc<M::State> {
        &self.state
    }

    /// Out-of-band channel to the frontend.
    pub fn publisher(&self) -> &Publisher {
        &self.env.publisher
    }

    /// Enqueues `action` and runs the loop until quiescent.
    pub fn dispatch(&mut self, action: M::Action) -> Result<Settled, DispatchError> {
        self.queue.push_back(action);
        self.settle(false)
    }

    /// Runs the loop for everything sent through handles so far.
    ///
    /// Does nothing when no action is pending.
    pub fn flush(&mut self) -> Result<Settled, DispatchError> {
        self.settle(false)
    }

    /// Invokes the tree once even without pending actions, then settles.
    pub fn refresh(&mut self) -> Result<Settled, DispatchError> {
        self.settle(true)
    }

    /// Drives the dispatcher until `token` is cancelled or a fatal error occurs.
    ///
    /// The tree is invoked once up front; afterwards each received action
    /// starts a cycle. The tree is destroyed on exit.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), DispatchError> {
        let outcome = self.drive(&token).await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, label = e.as_label(), "dispatcher stopped");
        }
        self.shutdown();
        outcome
    }

    async fn drive(&mut self, token: &CancellationToken) -> Result<(), DispatchError> {
        self.refresh()?;
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                next = self.rx.recv() => {
                    let Some(batch) = next else { return Ok(()) };
                    self.queue.extend(batch);
                    self.settle(false)?;
                }
            }
        }
    }

    /// Destroys the whole controller tree.
    pub fn shutdown(mut self) {
        let owner = ControllerId::from("dispatcher");
        self.root.destroy(&self.env.bus, &owner);
    }

    /// The fatal error that stopped this dispatcher, if any.
    pub fn failure(&self) -> Option<&DispatchError> {
        self.failure.as_ref()
    }

    fn settle(&mut self, rerun: bool) -> Result<Settled, DispatchError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        let outcome = self.cycle(rerun);
        if let Err(e) = &outcome {
            if e.is_fatal() {
                self.failure = Some(e.clone());
            }
        }
        outcome
    }

    fn cycle(&mut self, mut rerun: bool) -> Result<Settled, DispatchError> {
        let mut iterations = 0usize;
        let mut patches = Vec::new();

        loop {
            while let Ok(batch) = self.rx.try_recv() {
                self.queue.extend(batch);
            }
            if self.queue.is_empty() && !rerun {
                break;
            }
            if iterations >= self.max_iterations {
                tracing::error!(iterations, root = %self.root.id(), "controllers are stuck in a livelock");
                self.env
                    .bus
                    .publish(Event::new(EventKind::LivelockDetected).with_iteration(iterations));
                return Err(DispatchError::Livelock { iterations });
            }
            iterations += 1;

            let batch: Vec<M::Action> = self.queue.drain(..).collect();
            for action in batch {
                self.apply(action, iterations, &mut patches);
            }

            rerun = self.root.invoke(&self.state, &self.env)?;
            self.env.bus.publish(
                Event::new(EventKind::IterationCompleted)
                    .with_iteration(iterations)
                    .with_count(usize::from(rerun)),
            );
        }

        let delivered = patches.len();
        if delivered > 0 {
            self.frontend.patch_state(patches);
        }
        if iterations > 0 {
            tracing::trace!(iterations, patches = delivered, "dispatch loop quiescent");
            self.env.bus.publish(
                Event::new(EventKind::Quiescent)
                    .with_iteration(iterations)
                    .with_count(delivered),
            );
        }
        Ok(Settled {
            iterations,
            patches: delivered,
        })
    }

    /// Applies one action atomically: on rejection nothing of it is kept.
    fn apply(&mut self, action: M::Action, iteration: usize, patches: &mut Vec<Patch>) {
        let name = action.name();
        let mut next = M::State::clone(&self.state);
        let outcome = action.apply(&mut next).and_then(|()| {
            serde_json::to_value(&next).map_err(|e| ActionError::Snapshot(e.to_string()))
        });

        match outcome {
            Ok(snapshot) => {
                let before = patches.len();
                diff(&self.snapshot, &snapshot, patches);
                let produced = patches.len() - before;
                self.snapshot = snapshot;
                self.state = Arc::new(next);
                tracing::debug!(action = name, patches = produced, iteration, "action applied");
                self.env.bus.publish(
                    Event::new(EventKind::ActionApplied)
                        .with_action(name)
                        .with_count(produced)
                        .with_iteration(iteration),
                );
            }
            Err(e) => {
                tracing::warn!(action = name, error = %e, iteration, "action dropped");
                self.env.bus.publish(
                    Event::new(EventKind::ActionRejected)
                        .with_action(name)
                        .with_reason(e.to_string())
                        .with_iteration(iteration),
                );
            }
        }
    }
}
