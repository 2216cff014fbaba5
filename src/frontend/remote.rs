use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Frontend, Publication};
use crate::dispatch::Patch;
use crate::error::RemoteError;
use crate::remote::{Remote, RemoteCall, RemoteHandler, forward_remote_calls};

/// Calls a frontend accepts across a boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendCall {
    PatchState(Vec<Patch>),
    Publish(Publication),
}

impl RemoteCall for FrontendCall {
    type Reply = ();

    fn method(&self) -> &'static str {
        match self {
            FrontendCall::PatchState(_) => "patch_state",
            FrontendCall::Publish(_) => "publish",
        }
    }
}

/// [`Frontend`] that forwards everything over a [`Remote`] proxy.
///
/// Calls are fire-and-forget; ordering follows the underlying channel.
pub struct RemoteFrontend {
    remote: Arc<Remote<FrontendCall>>,
}

impl RemoteFrontend {
    pub fn new(remote: Arc<Remote<FrontendCall>>) -> Self {
        Self { remote }
    }

    /// Serves `target` on a separate task and returns a proxy to it.
    ///
    /// The returned handle finishes when the proxy side is dropped, or with
    /// an error on a response the proxy never asked for.
    pub fn spawn<F: Frontend + 'static>(target: Arc<F>) -> (Self, JoinHandle<Result<(), RemoteError>>) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let remote = Arc::new(Remote::new(req_tx));
        let listener = Arc::clone(&remote).listen(resp_rx);
        tokio::spawn(forward_remote_calls(req_rx, resp_tx, FrontendHandler(target)));
        (Self { remote }, listener)
    }

    fn forward(&self, call: FrontendCall) {
        drop(self.remote.send(call));
    }
}

impl Frontend for RemoteFrontend {
    fn patch_state(&self, patches: Vec<Patch>) {
        self.forward(FrontendCall::PatchState(patches));
    }

    fn publish(&self, publication: Publication) {
        self.forward(FrontendCall::Publish(publication));
    }
}

/// Responder side: applies incoming calls to a local frontend.
pub struct FrontendHandler<F>(pub Arc<F>);

impl<F: Frontend> RemoteHandler<FrontendCall> for FrontendHandler<F> {
    fn handle(&mut self, call: FrontendCall) -> Result<(), String> {
        match call {
            FrontendCall::PatchState(patches) => self.0.patch_state(patches),
            FrontendCall::Publish(publication) => self.0.publish(publication),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::dispatch::diff;
    use crate::frontend::RecordingFrontend;

    #[tokio::test]
    async fn test_calls_reach_target_in_order() {
        let target = Arc::new(RecordingFrontend::new(json!({"n": 0})));
        let (proxy, listener) = RemoteFrontend::spawn(Arc::clone(&target));

        let mut patches = Vec::new();
        diff(&json!({"n": 0}), &json!({"n": 1}), &mut patches);
        proxy.publish(Publication::Loading { pending: 2 });
        proxy.patch_state(patches);
        proxy.publish(Publication::Loading { pending: 0 });

        tokio::time::timeout(
            Duration::from_secs(1),
            target.wait_until(|rec| rec.publications.len() == 2),
        )
        .await
        .unwrap();

        let rec = target.snapshot();
        assert_eq!(rec.mirror, json!({"n": 1}));
        assert_eq!(
            rec.publications,
            vec![Publication::Loading { pending: 2 }, Publication::Loading { pending: 0 }]
        );
        assert!(!listener.is_finished());
    }
}
