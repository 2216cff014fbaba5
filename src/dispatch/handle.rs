use tokio::sync::mpsc;

use crate::error::DispatchError;

/// Cloneable handle for enqueueing actions from anywhere.
///
/// Actions sent through a handle are applied in send order. An action sent
/// while the loop is running lands in a later iteration of the same cycle;
/// one sent while it is idle starts a new cycle when the host drives the
/// dispatcher.
pub struct DispatchHandle<A> {
    tx: mpsc::UnboundedSender<Vec<A>>,
}

impl<A> DispatchHandle<A> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Vec<A>>) -> Self {
        Self { tx }
    }

    /// Enqueues an action. Never blocks.
    pub fn dispatch(&self, action: A) -> Result<(), DispatchError> {
        self.tx.send(vec![action]).map_err(|_| DispatchError::Closed)
    }

    /// Enqueues several actions as one unit: they are applied in order,
    /// all within the same pass.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = A>) -> Result<(), DispatchError> {
        let batch: Vec<A> = actions.into_iter().collect();
        if batch.is_empty() {
            return Ok(());
        }
        self.tx.send(batch).map_err(|_| DispatchError::Closed)
    }

    /// Whether the dispatcher has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<A> Clone for DispatchHandle<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A> std::fmt::Debug for DispatchHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_all_travels_as_one_unit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = DispatchHandle::new(tx);

        handle.dispatch(1).unwrap();
        handle.dispatch_all([2, 3, 4]).unwrap();
        handle.dispatch_all(Vec::new()).unwrap();

        assert_eq!(rx.try_recv().unwrap(), vec![1]);
        assert_eq!(rx.try_recv().unwrap(), vec![2, 3, 4]);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert_eq!(handle.dispatch_all([5]), Err(DispatchError::Closed));
        assert!(handle.is_closed());
    }
}
