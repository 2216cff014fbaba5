use std::fmt;
use std::sync::Arc;

use super::core::Controller;
use super::state::Mount;
use crate::dispatch::Model;

/// Identifier of a controller, unique among the children of one parent.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(Arc<str>);

impl ControllerId {
    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for ControllerId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ControllerId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&ControllerId> for Arc<str> {
    fn from(id: &ControllerId) -> Self {
        Arc::clone(&id.0)
    }
}

type Factory<M> = Box<dyn FnOnce(&Mount) -> Box<dyn Controller<M>> + Send>;

/// Declarative description of a desired child controller.
///
/// Holds the child id, a constructor and its arguments. The constructor only
/// runs the first time `id` appears in the parent's declaration.
pub struct ChildSpec<M: Model> {
    id: ControllerId,
    factory: Factory<M>,
}

impl<M: Model> ChildSpec<M> {
    /// Describes a child built by `factory(args, mount)`.
    pub fn new<A, C, F>(id: impl Into<ControllerId>, factory: F, args: A) -> Self
    where
        A: Send + 'static,
        C: Controller<M>,
        F: FnOnce(A, &Mount) -> C + Send + 'static,
    {
        Self {
            id: id.into(),
            factory: Box::new(move |mount: &Mount| -> Box<dyn Controller<M>> {
                Box::new(factory(args, mount))
            }),
        }
    }

    /// Id of the described child.
    pub fn id(&self) -> &ControllerId {
        &self.id
    }

    pub(crate) fn into_parts(self) -> (ControllerId, Factory<M>) {
        (self.id, self.factory)
    }
}

impl<M: Model> fmt::Debug for ChildSpec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSpec").field("id", &self.id).finish_non_exhaustive()
    }
}
