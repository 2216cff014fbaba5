use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::message::{RemoteCall, RemoteRequest, RemoteResponse};
use crate::deferred::{Deferred, Resolver, deferred};
use crate::error::RemoteError;

type Pending<C> = HashMap<u64, Resolver<<C as RemoteCall>::Reply, RemoteError>>;

/// Local proxy for calls executed on the other side of a boundary.
///
/// Every [`send`](Remote::send) allocates a fresh id, records a pending
/// resolver under it and posts a [`RemoteRequest`]. Incoming
/// [`RemoteResponse`]s settle and remove the matching resolver.
pub struct Remote<C: RemoteCall> {
    tx: mpsc::UnboundedSender<RemoteRequest<C>>,
    next_id: AtomicU64,
    pending: Mutex<Pending<C>>,
}

impl<C: RemoteCall> Remote<C> {
    /// Creates a proxy posting requests into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<RemoteRequest<C>>) -> Self {
        Self {
            tx,
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Sends `call` and returns a deferred settled by the matching response.
    ///
    /// Never blocks. A closed channel rejects the deferred with [`RemoteError::Closed`].
    pub fn send(&self, call: C) -> Deferred<C::Reply, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = call.method();
        let (resolver, deferred) = deferred();
        self.lock_pending().insert(id, resolver);

        if self.tx.send(RemoteRequest { id, call }).is_err() {
            tracing::debug!(id, method, "remote channel closed, rejecting call");
            if let Some(resolver) = self.lock_pending().remove(&id) {
                resolver.reject(RemoteError::Closed);
            }
        }
        deferred
    }

    /// Settles the deferred registered under `response.id`.
    ///
    /// An id with no pending deferred (never issued or already answered)
    /// returns [`RemoteError::NoDeferred`], which callers treat as fatal.
    pub fn handle_response(&self, response: RemoteResponse<C::Reply>) -> Result<(), RemoteError> {
        let resolver = self
            .lock_pending()
            .remove(&response.id)
            .ok_or(RemoteError::NoDeferred { id: response.id })?;

        match response.result {
            Ok(reply) => resolver.resolve(reply),
            Err(reason) => resolver.reject(RemoteError::Handler(reason)),
        }
        Ok(())
    }

    /// Number of calls still waiting for a response.
    pub fn pending(&self) -> usize {
        self.lock_pending().len()
    }

    /// Drives responses from `rx` until it closes or a fatal error occurs.
    ///
    /// Remaining pending calls are rejected with [`RemoteError::Closed`] on exit.
    pub fn listen(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<RemoteResponse<C::Reply>>,
    ) -> JoinHandle<Result<(), RemoteError>> {
        tokio::spawn(async move {
            let outcome = loop {
                let Some(response) = rx.recv().await else {
                    break Ok(());
                };
                if let Err(e) = self.handle_response(response) {
                    tracing::error!(error = %e, label = e.as_label(), "remote response rejected");
                    break Err(e);
                }
            };
            self.reject_all();
            outcome
        })
    }

    fn reject_all(&self) {
        let drained: Vec<_> = self.lock_pending().drain().collect();
        for (_, resolver) in drained {
            resolver.reject(RemoteError::Closed);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Pending<C>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Echo(&'static str);

    impl RemoteCall for Echo {
        type Reply = String;

        fn method(&self) -> &'static str {
            "echo"
        }
    }

    fn remote_with_first_id(first: u64) -> (Remote<Echo>, mpsc::UnboundedReceiver<RemoteRequest<Echo>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let remote = Remote::new(tx);
        remote.next_id.store(first, Ordering::Relaxed);
        (remote, rx)
    }

    #[tokio::test]
    async fn test_response_resolves_matching_call() {
        let (remote, mut rx) = remote_with_first_id(7);
        let pending = remote.send(Echo("x"));

        let req = rx.recv().await.unwrap();
        assert_eq!(req.id, 7);
        assert_eq!(req.call, Echo("x"));

        remote.handle_response(RemoteResponse::ok(7, "X".to_string())).unwrap();
        assert_eq!(pending.await.unwrap(), "X");
    }

    #[tokio::test]
    async fn test_second_response_with_same_id_is_rejected() {
        let (remote, _rx) = remote_with_first_id(7);
        let _pending = remote.send(Echo("x"));

        remote.handle_response(RemoteResponse::ok(7, "X".to_string())).unwrap();
        let err = remote
            .handle_response(RemoteResponse::ok(7, "X".to_string()))
            .unwrap_err();
        assert_eq!(err, RemoteError::NoDeferred { id: 7 });
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_handler_failure_rejects_call() {
        let (remote, _rx) = remote_with_first_id(0);
        let pending = remote.send(Echo("bad"));
        remote.handle_response(RemoteResponse::err(0, "unsupported")).unwrap();
        assert_eq!(
            pending.await.unwrap_err(),
            RemoteError::Handler("unsupported".into())
        );
        assert_eq!(remote.pending(), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_immediately() {
        let (remote, rx) = remote_with_first_id(0);
        drop(rx);
        let pending = remote.send(Echo("lost"));
        assert_eq!(pending.await.unwrap_err(), RemoteError::Closed);
        assert_eq!(remote.pending(), 0);
    }

    #[tokio::test]
    async fn test_listen_stops_on_unknown_id() {
        let (remote, _rx) = remote_with_first_id(0);
        let remote = Arc::new(remote);
        let orphan = remote.send(Echo("orphan"));

        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let listener = Arc::clone(&remote).listen(resp_rx);
        resp_tx.send(RemoteResponse::ok(99, String::new())).unwrap();

        assert_eq!(
            listener.await.unwrap(),
            Err(RemoteError::NoDeferred { id: 99 })
        );
        assert_eq!(orphan.await.unwrap_err(), RemoteError::Closed);
    }
}
