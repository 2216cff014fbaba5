//! Minimal model shared by unit tests.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::controller::{ChildSpec, Children, Controller, LocalState, Mount, RunContext, TreeEnv};
use crate::dispatch::{Action, DispatchHandle, Model};
use crate::error::{ActionError, ControllerError};
use crate::events::Bus;
use crate::frontend::{Publisher, RecordingFrontend};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Counter {
    pub value: i64,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum CounterAction {
    Add(i64),
    Note(String),
    /// Writes garbage, then refuses.
    Reject,
}

impl Action<Counter> for CounterAction {
    fn name(&self) -> &'static str {
        match self {
            CounterAction::Add(_) => "Add",
            CounterAction::Note(_) => "Note",
            CounterAction::Reject => "Reject",
        }
    }

    fn apply(self, state: &mut Counter) -> Result<(), ActionError> {
        match self {
            CounterAction::Add(n) => state.value += n,
            CounterAction::Note(note) => state.notes.push(note),
            CounterAction::Reject => {
                state.value = -999;
                return Err(ActionError::rejected("Reject", "always rejected"));
            }
        }
        Ok(())
    }
}

pub(crate) struct CounterModel;

impl Model for CounterModel {
    type State = Counter;
    type Action = CounterAction;
}

pub(crate) struct Idle;

impl Controller<CounterModel> for Idle {
    fn run(&mut self, _cx: &RunContext<'_, CounterModel>) -> Result<Children<CounterModel>, ControllerError> {
        Ok(None)
    }
}

pub(crate) fn idle_root() -> ChildSpec<CounterModel> {
    ChildSpec::new("idle", |_: (), _: &Mount| Idle, ())
}

/// Stores a fresh allocation on every run, so it never settles.
pub(crate) struct Restless {
    local: LocalState<u64>,
}

impl Controller<CounterModel> for Restless {
    fn run(&mut self, _cx: &RunContext<'_, CounterModel>) -> Result<Children<CounterModel>, ControllerError> {
        let fresh = Arc::new(**self.local.get());
        self.local.set(fresh)?;
        Ok(None)
    }
}

pub(crate) fn restless_root() -> ChildSpec<CounterModel> {
    ChildSpec::new("restless", |_: (), m: &Mount| Restless { local: m.state(0) }, ())
}

/// Tree environment wired to a recording frontend.
pub(crate) fn test_env() -> (
    TreeEnv<CounterModel>,
    mpsc::UnboundedReceiver<Vec<CounterAction>>,
    Arc<RecordingFrontend>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let frontend = Arc::new(RecordingFrontend::default());
    let env = TreeEnv {
        dispatch: DispatchHandle::new(tx),
        publisher: Publisher::new(frontend.clone()),
        bus: Bus::new(64),
    };
    (env, rx, frontend)
}
