use super::state::{
    EngineState, QueryConfig, State, Status, TraceSource, TraceTime, VisibleTime, unix_now,
};
use crate::core::NewEngineMode;
use crate::dispatch::{self, Model};
use crate::engine::EngineMode;
use crate::error::ActionError;

/// Binds [`State`] to [`Action`].
pub struct TraceApp;

impl Model for TraceApp {
    type State = State;
    type Action = Action;
}

/// Named transforms of the trace viewer state.
#[derive(Debug, Clone)]
pub enum Action {
    OpenTraceFromFile { path: String },
    OpenTraceFromBuffer { name: String, data: Vec<u8> },
    OpenTraceFromUrl { url: String },
    /// Attach to the trace already loaded by the accelerator.
    OpenTraceFromHttpRpc,
    SetEngineReady {
        engine_id: String,
        ready: bool,
        mode: EngineMode,
    },
    SetEngineFailed { engine_id: String, reason: String },
    SetNewEngineMode { mode: NewEngineMode },
    ExecuteQuery {
        query_id: String,
        engine_id: String,
        query: String,
    },
    /// Removes the query only while it still holds `query`; a newer
    /// query stored under the same id is left alone.
    DeleteQuery { query_id: String, query: String },
    UpdateStatus { message: String, timestamp: u64 },
    Navigate { route: String },
    SetTraceTime { time: TraceTime },
    SetVisibleTraceTime { time: VisibleTime },
}

impl Action {
    /// Status update stamped with the current time.
    pub fn status(message: impl Into<String>) -> Self {
        Action::UpdateStatus {
            message: message.into(),
            timestamp: unix_now(),
        }
    }
}

impl dispatch::Action<State> for Action {
    fn name(&self) -> &'static str {
        match self {
            Action::OpenTraceFromFile { .. } => "OpenTraceFromFile",
            Action::OpenTraceFromBuffer { .. } => "OpenTraceFromBuffer",
            Action::OpenTraceFromUrl { .. } => "OpenTraceFromUrl",
            Action::OpenTraceFromHttpRpc => "OpenTraceFromHttpRpc",
            Action::SetEngineReady { .. } => "SetEngineReady",
            Action::SetEngineFailed { .. } => "SetEngineFailed",
            Action::SetNewEngineMode { .. } => "SetNewEngineMode",
            Action::ExecuteQuery { .. } => "ExecuteQuery",
            Action::DeleteQuery { .. } => "DeleteQuery",
            Action::UpdateStatus { .. } => "UpdateStatus",
            Action::Navigate { .. } => "Navigate",
            Action::SetTraceTime { .. } => "SetTraceTime",
            Action::SetVisibleTraceTime { .. } => "SetVisibleTraceTime",
        }
    }

    fn apply(self, state: &mut State) -> Result<(), ActionError> {
        let name = dispatch::Action::name(&self);
        match self {
            Action::OpenTraceFromFile { path } => open_trace(state, TraceSource::File { path }),
            Action::OpenTraceFromBuffer { name, data } => {
                open_trace(state, TraceSource::buffer(name, data))
            }
            Action::OpenTraceFromUrl { url } => open_trace(state, TraceSource::Url { url }),
            Action::OpenTraceFromHttpRpc => open_trace(state, TraceSource::HttpRpc),
            Action::SetEngineReady {
                engine_id,
                ready,
                mode,
            } => {
                let engine = engine_mut(state, name, &engine_id)?;
                engine.ready = ready;
                engine.mode = Some(mode);
            }
            Action::SetEngineFailed { engine_id, reason } => {
                engine_mut(state, name, &engine_id)?.failure = Some(reason);
            }
            Action::SetNewEngineMode { mode } => state.new_engine_mode = mode,
            Action::ExecuteQuery {
                query_id,
                engine_id,
                query,
            } => {
                if !state.engines.contains_key(&engine_id) {
                    return Err(ActionError::rejected(name, format!("unknown engine {engine_id}")));
                }
                state.queries.insert(
                    query_id.clone(),
                    QueryConfig {
                        id: query_id,
                        engine_id,
                        query,
                    },
                );
            }
            Action::DeleteQuery { query_id, query } => {
                if state.queries.get(&query_id).is_some_and(|q| q.query == query) {
                    state.queries.remove(&query_id);
                }
            }
            Action::UpdateStatus { message, timestamp } => {
                state.status = Status { message, timestamp };
            }
            Action::Navigate { route } => state.route = Some(route),
            Action::SetTraceTime { time } => {
                check_span(name, time.start_sec, time.end_sec)?;
                state.trace_time = time;
            }
            Action::SetVisibleTraceTime { time } => {
                check_span(name, time.start_sec, time.end_sec)?;
                state.visible_time = time;
            }
        }
        Ok(())
    }
}

fn open_trace(state: &mut State, source: TraceSource) {
    state.engines.clear();
    state.queries.clear();
    state.route = None;
    state.trace_time = TraceTime::default();
    state.visible_time = VisibleTime::default();

    let id = state.next_id.to_string();
    state.next_id += 1;
    state.engines.insert(
        id.clone(),
        EngineState {
            id,
            source,
            ready: false,
            mode: None,
            failure: None,
        },
    );
}

fn check_span(action: &'static str, start: f64, end: f64) -> Result<(), ActionError> {
    if start.is_finite() && end.is_finite() && start <= end {
        Ok(())
    } else {
        Err(ActionError::rejected(action, format!("bad time span {start}..{end}")))
    }
}

fn engine_mut<'a>(
    state: &'a mut State,
    action: &'static str,
    engine_id: &str,
) -> Result<&'a mut EngineState, ActionError> {
    state
        .engines
        .get_mut(engine_id)
        .ok_or_else(|| ActionError::rejected(action, format!("unknown engine {engine_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Action as _;

    fn opened() -> State {
        let mut state = State::default();
        Action::OpenTraceFromFile {
            path: "/tmp/a.pftrace".into(),
        }
        .apply(&mut state)
        .unwrap();
        state
    }

    #[test]
    fn test_open_trace_replaces_engines_and_queries() {
        let mut state = opened();
        Action::ExecuteQuery {
            query_id: "q".into(),
            engine_id: "0".into(),
            query: "select 1".into(),
        }
        .apply(&mut state)
        .unwrap();

        Action::OpenTraceFromUrl {
            url: "https://example.com/t".into(),
        }
        .apply(&mut state)
        .unwrap();

        assert_eq!(state.engines.keys().collect::<Vec<_>>(), vec!["1"]);
        assert!(matches!(state.engines["1"].source, TraceSource::Url { .. }));
        assert!(state.queries.is_empty());
        assert_eq!(state.next_id, 2);
    }

    #[test]
    fn test_engine_updates_require_known_engine() {
        let mut state = opened();
        Action::SetEngineReady {
            engine_id: "0".into(),
            ready: true,
            mode: EngineMode::HttpRpc,
        }
        .apply(&mut state)
        .unwrap();
        assert!(state.engines["0"].ready);
        assert_eq!(state.engines["0"].mode, Some(EngineMode::HttpRpc));

        let err = Action::SetEngineFailed {
            engine_id: "7".into(),
            reason: "gone".into(),
        }
        .apply(&mut state)
        .unwrap_err();
        assert_eq!(err.as_label(), "action_rejected");
    }

    #[test]
    fn test_delete_query_ignores_replaced_text() {
        let mut state = opened();
        let execute = |query: &str| Action::ExecuteQuery {
            query_id: "q".into(),
            engine_id: "0".into(),
            query: query.into(),
        };
        execute("select 1").apply(&mut state).unwrap();
        execute("select 2").apply(&mut state).unwrap();

        Action::DeleteQuery {
            query_id: "q".into(),
            query: "select 1".into(),
        }
        .apply(&mut state)
        .unwrap();
        assert_eq!(state.queries["q"].query, "select 2");

        Action::DeleteQuery {
            query_id: "q".into(),
            query: "select 2".into(),
        }
        .apply(&mut state)
        .unwrap();
        assert!(state.queries.is_empty());
    }

    #[test]
    fn test_trace_time_rejects_backwards_span() {
        let mut state = opened();
        let time = TraceTime {
            start_sec: 1.0,
            end_sec: 4.0,
        };
        Action::SetTraceTime { time }.apply(&mut state).unwrap();
        Action::SetVisibleTraceTime {
            time: VisibleTime::whole(time),
        }
        .apply(&mut state)
        .unwrap();
        assert_eq!(state.trace_time, time);
        assert_eq!(state.visible_time.end_sec, 4.0);

        let err = Action::SetTraceTime {
            time: TraceTime {
                start_sec: 5.0,
                end_sec: 2.0,
            },
        }
        .apply(&mut state)
        .unwrap_err();
        assert_eq!(err.as_label(), "action_rejected");

        Action::OpenTraceFromHttpRpc.apply(&mut state).unwrap();
        assert_eq!(state.trace_time, TraceTime::default());
        assert_eq!(state.visible_time, VisibleTime::default());
    }

    #[test]
    fn test_status_is_timestamped() {
        let mut state = State::default();
        Action::status("Opening trace").apply(&mut state).unwrap();
        assert_eq!(state.status.message, "Opening trace");
        assert!(state.status.timestamp > 0);
    }
}
