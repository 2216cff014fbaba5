use tokio::sync::mpsc;

use super::message::{RemoteCall, RemoteRequest, RemoteResponse};

/// Receiving side of a [`Remote`](super::Remote): executes one call synchronously.
pub trait RemoteHandler<C: RemoteCall>: Send {
    /// Executes `call`. An `Err` is posted back and rejects the caller's deferred.
    fn handle(&mut self, call: C) -> Result<C::Reply, String>;
}

/// Serves requests from `rx` with `handler`, posting `{id, result}` to `tx`.
///
/// Returns when either channel closes.
pub async fn forward_remote_calls<C, H>(
    mut rx: mpsc::UnboundedReceiver<RemoteRequest<C>>,
    tx: mpsc::UnboundedSender<RemoteResponse<C::Reply>>,
    mut handler: H,
) where
    C: RemoteCall,
    H: RemoteHandler<C>,
{
    while let Some(RemoteRequest { id, call }) = rx.recv().await {
        let method = call.method();
        let result = handler.handle(call);
        if let Err(reason) = &result {
            tracing::warn!(id, method, %reason, "remote handler failed");
        }
        if tx.send(RemoteResponse { id, result }).is_err() {
            tracing::debug!(id, method, "remote response channel closed");
            break;
        }
    }
}
