use serde::Serialize;

use crate::error::ActionError;

/// A named pure transform of the state `S`.
pub trait Action<S>: Send + 'static {
    /// Transform name (for logs and events).
    fn name(&self) -> &'static str;

    /// Applies the transform in place.
    ///
    /// On `Err` the dispatcher discards every write made to `state`.
    fn apply(self, state: &mut S) -> Result<(), ActionError>;
}

/// Binds a state type to its action type.
pub trait Model: Send + Sync + 'static {
    /// Process-wide application state.
    type State: Clone + Serialize + Send + Sync + 'static;
    /// Actions accepted by the dispatcher.
    type Action: Action<Self::State>;
}
