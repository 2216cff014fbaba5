//! # Single-resolution future with an external resolver.
//!
//! [`deferred`] returns a producer/consumer pair:
//!
//! ```text
//!   Resolver<T, E> ──resolve(v)/reject(e)──► oneshot ──► Deferred<T, E>.await
//! ```
//!
//! ## Rules
//! - A [`Resolver`] settles at most once (`resolve`/`reject` consume it).
//! - Dropping an unsettled [`Resolver`] completes the [`Deferred`] with `E::from(Dropped)`.
//! - The consumer may poll it as a future or check it synchronously with [`Deferred::try_take`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Resolution produced when the resolving side went away without settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dropped;

impl std::fmt::Display for Dropped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("deferred dropped before resolution")
    }
}

impl std::error::Error for Dropped {}

/// Creates a linked resolver/deferred pair.
pub fn deferred<T, E>() -> (Resolver<T, E>, Deferred<T, E>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Deferred { rx })
}

/// Producer half: settles the paired [`Deferred`] exactly once.
#[derive(Debug)]
pub struct Resolver<T, E> {
    tx: oneshot::Sender<Result<T, E>>,
}

impl<T, E> Resolver<T, E> {
    /// Completes the deferred with a value.
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    /// Completes the deferred with an error.
    pub fn reject(self, err: E) {
        self.settle(Err(err));
    }

    /// Completes the deferred with a ready result.
    ///
    /// A consumer that already went away is not an error.
    pub fn settle(self, result: Result<T, E>) {
        let _ = self.tx.send(result);
    }

    /// Whether the consumer side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half: resolves to the value or error passed to the [`Resolver`].
#[derive(Debug)]
#[must_use = "a deferred does nothing unless awaited or polled"]
pub struct Deferred<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E: From<Dropped>> Deferred<T, E> {
    /// Returns the settled result without waiting, or `None` if still pending.
    ///
    /// Once this returns `Some`, the deferred is spent and must not be awaited.
    pub fn try_take(&mut self) -> Option<Result<T, E>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(E::from(Dropped))),
        }
    }
}

impl<T, E: From<Dropped>> Future for Deferred<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(E::from(Dropped))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Boom,
        Gone,
    }

    impl From<Dropped> for TestError {
        fn from(_: Dropped) -> Self {
            TestError::Gone
        }
    }

    #[tokio::test]
    async fn test_resolves_once() {
        let (resolver, deferred) = deferred::<u32, TestError>();
        resolver.resolve(42);
        assert_eq!(deferred.await, Ok(42));
    }

    #[tokio::test]
    async fn test_reject_propagates_error() {
        let (resolver, deferred) = deferred::<u32, TestError>();
        resolver.reject(TestError::Boom);
        assert_eq!(deferred.await, Err(TestError::Boom));
    }

    #[tokio::test]
    async fn test_dropped_resolver_rejects() {
        let (resolver, deferred) = deferred::<u32, TestError>();
        drop(resolver);
        assert_eq!(deferred.await, Err(TestError::Gone));
    }

    #[test]
    fn test_try_take_is_non_blocking() {
        let (resolver, mut deferred) = deferred::<&str, TestError>();
        assert!(deferred.try_take().is_none());
        resolver.resolve("ready");
        assert_eq!(deferred.try_take(), Some(Ok("ready")));
    }

    #[test]
    fn test_resolver_sees_abandoned_consumer() {
        let (resolver, deferred) = deferred::<(), TestError>();
        assert!(!resolver.is_abandoned());
        drop(deferred);
        assert!(resolver.is_abandoned());
    }
}
