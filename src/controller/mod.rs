//! # Reactive controller tree.
//!
//! Every controller re-derives its children from the shared state each time it
//! is invoked. A parent owns its children exclusively, keyed by [`ControllerId`].
//!
//! ## Invocation
//! ```text
//! invoke(node)
//!   ├─► running? ──yes──► ControllerError::Reentrant
//!   ├─► running = true
//!   ├─► clear dirty ─► run(cx) ─► self_changed = dirty ─► clear dirty
//!   ├─► declared ids unique? ──no──► ControllerError::DuplicateChild
//!   ├─► for id in previous order, absent now:  destroy (descendants first, on_destroy)
//!   ├─► for id in declared order, new:          factory(args, &mount)
//!   ├─► for id in declared order:               any_child_changed |= invoke(child)
//!   └─► running = false; return self_changed || any_child_changed
//! ```
//!
//! ## Rules
//! - All removals happen before any newly declared child is constructed or invoked.
//! - [`LocalState::set`] is legal only while the owning controller's `run()` executes.
//! - Setting a value that is the same `Arc` allocation does not request a re-run.
//! - Fatal errors propagate unchanged; the node that raised them stays poisoned.

mod context;
mod core;
mod spec;
mod state;

pub(crate) use self::core::ControllerNode;
pub(crate) use context::TreeEnv;

pub use self::core::{Children, Controller};
pub use context::RunContext;
pub use spec::{ChildSpec, ControllerId};
pub use state::{LocalState, Mount};
