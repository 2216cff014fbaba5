//! # Dispatch loop: actions in, one atomic patch batch out.
//!
//! ```text
//! DispatchHandle::dispatch(a) ──► channel ──┐
//! Dispatcher::dispatch(a) ──────────────────┤
//!                                           ▼
//! settle():
//!   loop while queue non-empty || re-run requested:
//!     a. drain channel into queue, take the whole queue as this pass's batch
//!     b. for action in batch: clone state ─► apply ─► diff snapshots ─► keep or drop
//!     c. rerun = root.invoke(state)
//!     d. iterations += 1 (past the ceiling ─► DispatchError::Livelock)
//!   frontend.patch_state(all patches of the cycle)   (once, skipped when empty)
//! ```
//!
//! ## Rules
//! - Actions apply in enqueue order; actions dispatched during a pass land in the next pass.
//! - Each action is atomic: a rejected action leaves no trace in state or patches.
//! - Controllers of one pass all observe the same `Arc<State>`.
//! - Patches delivered for a batch equal those of applying it sequentially.
//! - After a fatal error every call returns that error without running a cycle.

mod action;
mod dispatcher;
mod handle;
mod patch;

pub use action::{Action, Model};
pub use dispatcher::{Dispatcher, Settled};
pub use handle::DispatchHandle;
pub use patch::{Patch, PatchOp, PathSegment, apply_patches, diff};
