use super::AppContext;
use super::trace::TraceController;
use crate::app::TraceApp;
use crate::controller::{ChildSpec, Children, Controller, Mount, RunContext};
use crate::error::ControllerError;

/// Root of the tree: keeps one [`TraceController`] per engine in the state.
pub struct AppController {
    ctx: AppContext,
}

impl AppController {
    pub fn spec(ctx: AppContext) -> ChildSpec<TraceApp> {
        ChildSpec::new("app", |ctx, _: &Mount| AppController { ctx }, ctx)
    }
}

impl Controller<TraceApp> for AppController {
    fn run(&mut self, cx: &RunContext<'_, TraceApp>) -> Result<Children<TraceApp>, ControllerError> {
        let children = cx
            .state()
            .engines
            .keys()
            .map(|engine_id| TraceController::spec(engine_id, self.ctx.clone()))
            .collect();
        Ok(Some(children))
    }
}
