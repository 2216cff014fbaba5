use std::time::Instant;

use crate::app::{Action, TraceApp};
use crate::controller::{ChildSpec, Children, Controller, Mount, RunContext};
use crate::engine::{Engine, EngineMode};
use crate::error::ControllerError;
use crate::frontend::Publication;

/// Runs one query against its engine and publishes the result.
///
/// The query is removed from the state once answered, which destroys this
/// controller. A query replaced under the same id before that runs again.
pub struct QueryController {
    query_id: String,
    engine: Engine,
    last_run: Option<String>,
}

impl QueryController {
    pub fn spec(query_id: &str, engine: Engine) -> ChildSpec<TraceApp> {
        ChildSpec::new(
            query_id,
            |(query_id, engine): (String, Engine), _: &Mount| QueryController {
                query_id,
                engine,
                last_run: None,
            },
            (query_id.to_string(), engine),
        )
    }
}

impl Controller<TraceApp> for QueryController {
    fn run(&mut self, cx: &RunContext<'_, TraceApp>) -> Result<Children<TraceApp>, ControllerError> {
        let Some(config) = cx.state().queries.get(&self.query_id) else {
            return Ok(None);
        };
        if self.last_run.as_deref() == Some(config.query.as_str()) {
            return Ok(None);
        }
        self.last_run = Some(config.query.clone());

        let query_id = self.query_id.clone();
        let query = config.query.clone();
        let engine = self.engine.clone();
        let dispatch = cx.dispatcher().clone();
        let publisher = cx.publisher().clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = engine.query(&query).await;
            let duration = started.elapsed();
            tracing::debug!(engine = engine.id(), query_id = %query_id, ?duration, ok = result.is_ok(), "query finished");

            let mut follow_up = Vec::with_capacity(2);
            if let Err(e) = &result {
                if engine.mode() == EngineMode::HttpRpc {
                    follow_up.push(Action::SetEngineFailed {
                        engine_id: engine.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            publisher.publish(Publication::QueryResult {
                query_id: query_id.clone(),
                query: query.clone(),
                duration,
                result: result.map_err(|e| e.to_string()),
            });
            follow_up.push(Action::DeleteQuery { query_id, query });
            if dispatch.dispatch_all(follow_up).is_err() {
                tracing::debug!(engine = engine.id(), "query result dropped, dispatcher closed");
            }
        });
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "QueryController"
    }
}
