//! Controller-local state and the run-window flags guarding it.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::spec::ControllerId;
use crate::error::ControllerError;

/// Flags shared between a controller node and the local state it handed out.
#[derive(Debug, Default)]
pub(crate) struct RunFlags {
    in_run: AtomicBool,
    dirty: AtomicBool,
}

impl RunFlags {
    pub(crate) fn enter_run(&self) {
        self.dirty.store(false, Ordering::Relaxed);
        self.in_run.store(true, Ordering::Relaxed);
    }

    /// Closes the run window and returns whether local state changed inside it.
    pub(crate) fn exit_run(&self) -> bool {
        self.in_run.store(false, Ordering::Relaxed);
        self.dirty.swap(false, Ordering::Relaxed)
    }
}

/// Construction context handed to a child factory.
#[derive(Debug)]
pub struct Mount {
    id: ControllerId,
    flags: Arc<RunFlags>,
}

impl Mount {
    pub(crate) fn new(id: ControllerId) -> Self {
        Self {
            id,
            flags: Arc::new(RunFlags::default()),
        }
    }

    /// Id of the controller being constructed.
    pub fn id(&self) -> &ControllerId {
        &self.id
    }

    /// Creates a local state slot owned by this controller.
    pub fn state<T>(&self, initial: T) -> LocalState<T> {
        LocalState {
            value: Arc::new(initial),
            flags: Arc::clone(&self.flags),
        }
    }

    pub(crate) fn flags(&self) -> Arc<RunFlags> {
        Arc::clone(&self.flags)
    }
}

/// Local state of one controller.
///
/// Writable only while that controller's `run()` executes. Storing a value
/// that is not the same allocation as the current one requests a re-run.
#[derive(Debug)]
pub struct LocalState<T> {
    value: Arc<T>,
    flags: Arc<RunFlags>,
}

impl<T> LocalState<T> {
    /// Shared handle to the current value.
    pub fn get(&self) -> &Arc<T> {
        &self.value
    }

    /// Replaces the value.
    ///
    /// Fails with [`ControllerError::SetStateOutsideRun`] outside `run()`.
    /// Passing back the current `Arc` (same allocation) is a no-op.
    pub fn set(&mut self, value: impl Into<Arc<T>>) -> Result<(), ControllerError> {
        if !self.flags.in_run.load(Ordering::Relaxed) {
            return Err(ControllerError::SetStateOutsideRun);
        }
        let value = value.into();
        if !Arc::ptr_eq(&self.value, &value) {
            self.flags.dirty.store(true, Ordering::Relaxed);
        }
        self.value = value;
        Ok(())
    }
}

impl<T> Deref for LocalState<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
