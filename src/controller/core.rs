use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::context::{RunContext, TreeEnv};
use super::spec::{ChildSpec, ControllerId};
use super::state::{Mount, RunFlags};
use crate::dispatch::Model;
use crate::error::ControllerError;
use crate::events::{Bus, Event, EventKind};

/// Children declared by one `run()`; `None` declares no children.
pub type Children<M> = Option<Vec<ChildSpec<M>>>;

/// A reactive unit of the controller tree.
///
/// `run()` must not block: it inspects the state, starts async work and
/// returns the children it wants to exist. Results of that work come back
/// later as dispatched actions.
pub trait Controller<M: Model>: Send + 'static {
    /// Re-derives this controller's children from the current state.
    fn run(&mut self, cx: &RunContext<'_, M>) -> Result<Children<M>, ControllerError>;

    /// Called once when the controller disappears from its parent's declaration.
    fn on_destroy(&mut self) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A mounted controller with its reconciled children.
pub(crate) struct ControllerNode<M: Model> {
    id: ControllerId,
    controller: Box<dyn Controller<M>>,
    flags: Arc<RunFlags>,
    running: bool,
    children: HashMap<ControllerId, ControllerNode<M>>,
    order: Vec<ControllerId>,
}

impl<M: Model> ControllerNode<M> {
    /// Constructs the controller described by `spec`.
    pub(crate) fn mount(spec: ChildSpec<M>) -> Self {
        let (id, factory) = spec.into_parts();
        let mount = Mount::new(id.clone());
        let controller = factory(&mount);
        Self {
            id,
            controller,
            flags: mount.flags(),
            running: false,
            children: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> &ControllerId {
        &self.id
    }

    /// Runs this controller, reconciles its children and invokes them.
    ///
    /// Returns whether this controller or any descendant requested a re-run.
    /// A fatal error leaves the node marked as running; any later invocation
    /// of it reports [`ControllerError::Reentrant`].
    pub(crate) fn invoke(
        &mut self,
        state: &Arc<M::State>,
        env: &TreeEnv<M>,
    ) -> Result<bool, ControllerError> {
        if self.running {
            return Err(ControllerError::Reentrant {
                id: self.id.clone(),
            });
        }
        self.running = true;

        self.flags.enter_run();
        let declared = self.controller.run(&RunContext::new(&self.id, state, env));
        let self_changed = self.flags.exit_run();
        let next = declared?.unwrap_or_default();

        let mut wanted = HashSet::with_capacity(next.len());
        for spec in &next {
            if !wanted.insert(spec.id().clone()) {
                return Err(ControllerError::DuplicateChild {
                    parent: self.id.clone(),
                    child: spec.id().clone(),
                });
            }
        }

        for gone in std::mem::take(&mut self.order) {
            if wanted.contains(&gone) {
                continue;
            }
            if let Some(mut child) = self.children.remove(&gone) {
                child.destroy(&env.bus, &self.id);
            }
        }

        for spec in next {
            let id = spec.id().clone();
            if !self.children.contains_key(&id) {
                let child = ControllerNode::mount(spec);
                tracing::debug!(parent = %self.id, id = %id, name = child.controller.name(), "controller created");
                env.bus.publish(
                    Event::new(EventKind::ControllerCreated)
                        .with_controller(&id)
                        .with_reason(&self.id),
                );
                self.children.insert(id.clone(), child);
            }
            self.order.push(id);
        }

        let mut any_child_changed = false;
        for id in &self.order {
            if let Some(child) = self.children.get_mut(id) {
                any_child_changed |= child.invoke(state, env)?;
            }
        }

        self.running = false;
        Ok(self_changed || any_child_changed)
    }

    /// Destroys descendants first, then this controller.
    pub(crate) fn destroy(&mut self, bus: &Bus, parent: &ControllerId) {
        for id in std::mem::take(&mut self.order) {
            if let Some(mut child) = self.children.remove(&id) {
                child.destroy(bus, &self.id);
            }
        }
        self.controller.on_destroy();
        tracing::debug!(parent = %parent, id = %self.id, "controller destroyed");
        bus.publish(
            Event::new(EventKind::ControllerDestroyed)
                .with_controller(&self.id)
                .with_reason(parent),
        );
    }

    #[cfg(test)]
    pub(crate) fn child_ids(&self) -> Vec<&str> {
        self.order.iter().map(ControllerId::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{Counter, CounterModel, test_env};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Probe {
        id: String,
        log: Log,
    }

    impl Probe {
        fn spec(id: &str, log: Log) -> ChildSpec<CounterModel> {
            ChildSpec::new(
                id,
                |(id, log): (String, Log), _mount: &Mount| {
                    log.lock().unwrap().push(format!("new:{id}"));
                    Probe { id, log }
                },
                (id.to_string(), log),
            )
        }
    }

    impl Controller<CounterModel> for Probe {
        fn run(&mut self, _cx: &RunContext<'_, CounterModel>) -> Result<Children<CounterModel>, ControllerError> {
            self.log.lock().unwrap().push(format!("run:{}", self.id));
            Ok(None)
        }

        fn on_destroy(&mut self) {
            self.log.lock().unwrap().push(format!("destroy:{}", self.id));
        }
    }

    /// Declares one probe per id in `wanted`.
    struct Parent {
        wanted: Arc<Mutex<Vec<&'static str>>>,
        log: Log,
    }

    impl Controller<CounterModel> for Parent {
        fn run(&mut self, _cx: &RunContext<'_, CounterModel>) -> Result<Children<CounterModel>, ControllerError> {
            let wanted = self.wanted.lock().unwrap().clone();
            Ok(Some(
                wanted
                    .into_iter()
                    .map(|id| Probe::spec(id, Arc::clone(&self.log)))
                    .collect(),
            ))
        }
    }

    fn parent(wanted: &[&'static str]) -> (ControllerNode<CounterModel>, Arc<Mutex<Vec<&'static str>>>, Log) {
        let wanted = Arc::new(Mutex::new(wanted.to_vec()));
        let log: Log = Arc::default();
        let args = (Arc::clone(&wanted), Arc::clone(&log));
        let node = ControllerNode::mount(ChildSpec::new(
            "root",
            |(wanted, log): (Arc<Mutex<Vec<&'static str>>>, Log), _mount: &Mount| {
                Parent { wanted, log }
            },
            args,
        ));
        (node, wanted, log)
    }

    fn state() -> Arc<Counter> {
        Arc::new(Counter::default())
    }

    #[tokio::test]
    async fn test_removed_children_destroyed_before_new_ones_run() {
        let (env, _rx, _frontend) = test_env();
        let (mut root, wanted, log) = parent(&["a", "b"]);

        assert!(!root.invoke(&state(), &env).unwrap());
        assert_eq!(root.child_ids(), vec!["a", "b"]);

        *wanted.lock().unwrap() = vec!["b", "c"];
        log.lock().unwrap().clear();
        root.invoke(&state(), &env).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["destroy:a", "new:c", "run:b", "run:c"]
        );
        assert_eq!(root.child_ids(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_no_children_destroys_all_once() {
        let (env, _rx, _frontend) = test_env();
        let (mut root, wanted, log) = parent(&["a", "b"]);
        root.invoke(&state(), &env).unwrap();

        wanted.lock().unwrap().clear();
        root.invoke(&state(), &env).unwrap();
        root.invoke(&state(), &env).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.iter().filter(|l| *l == "destroy:a").count(), 1);
        assert_eq!(log.iter().filter(|l| *l == "destroy:b").count(), 1);
        assert!(root.child_ids().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_child_is_fatal() {
        let (env, _rx, _frontend) = test_env();
        let (mut root, _wanted, _log) = parent(&["a", "a"]);
        let err = root.invoke(&state(), &env).unwrap_err();
        assert_eq!(
            err,
            ControllerError::DuplicateChild {
                parent: "root".into(),
                child: "a".into()
            }
        );
    }

    #[tokio::test]
    async fn test_reentrant_invoke_is_fatal() {
        let (env, _rx, _frontend) = test_env();
        let (mut root, _wanted, _log) = parent(&[]);
        root.running = true;
        let err = root.invoke(&state(), &env).unwrap_err();
        assert_eq!(err, ControllerError::Reentrant { id: "root".into() });
    }

    #[tokio::test]
    async fn test_node_stays_poisoned_after_fatal_error() {
        let (env, _rx, _frontend) = test_env();
        let (mut root, wanted, _log) = parent(&["x", "x"]);
        assert!(root.invoke(&state(), &env).is_err());

        *wanted.lock().unwrap() = vec!["x"];
        let err = root.invoke(&state(), &env).unwrap_err();
        assert_eq!(err.as_label(), "controller_reentrant");
    }

    struct Restless {
        local: crate::controller::LocalState<u32>,
    }

    impl Controller<CounterModel> for Restless {
        fn run(&mut self, _cx: &RunContext<'_, CounterModel>) -> Result<Children<CounterModel>, ControllerError> {
            let next = *self.local + 1;
            self.local.set(next)?;
            Ok(None)
        }

        fn on_destroy(&mut self) {
            assert_eq!(self.local.set(0u32), Err(ControllerError::SetStateOutsideRun));
        }
    }

    #[tokio::test]
    async fn test_local_state_change_requests_rerun() {
        let (env, _rx, _frontend) = test_env();
        let mut node = ControllerNode::mount(ChildSpec::new(
            "restless",
            |_: (), mount: &Mount| Restless {
                local: mount.state(0),
            },
            (),
        ));
        assert!(node.invoke(&state(), &env).unwrap());
        assert!(node.invoke(&state(), &env).unwrap());
        node.destroy(&env.bus, &"test".into());
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let (env, _rx, _frontend) = test_env();
        let mut events = env.bus.subscribe();
        let (mut root, wanted, _log) = parent(&["a"]);
        root.invoke(&state(), &env).unwrap();
        wanted.lock().unwrap().clear();
        root.invoke(&state(), &env).unwrap();

        let created = events.recv().await.unwrap();
        assert_eq!(created.kind, EventKind::ControllerCreated);
        assert_eq!(created.controller.as_deref(), Some("a"));
        let destroyed = events.recv().await.unwrap();
        assert_eq!(destroyed.kind, EventKind::ControllerDestroyed);
        assert_eq!(destroyed.reason.as_deref(), Some("root"));
    }
}
