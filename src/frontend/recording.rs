use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::Notify;

use super::{Frontend, Publication};
use crate::dispatch::{Patch, apply_patches};

/// Everything a [`RecordingFrontend`] has received so far.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// State rebuilt by replaying every batch onto the initial snapshot.
    pub mirror: Value,
    /// Patch batches in delivery order.
    pub batches: Vec<Vec<Patch>>,
    /// Published payloads in delivery order.
    pub publications: Vec<Publication>,
    /// Batches that did not replay cleanly.
    pub patch_errors: usize,
}

impl Recording {
    /// Status messages published so far.
    pub fn statuses(&self) -> Vec<&str> {
        self.publications
            .iter()
            .filter_map(|p| match p {
                Publication::Status { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// In-memory frontend for hosts without a view layer and for tests.
#[derive(Debug, Default)]
pub struct RecordingFrontend {
    inner: Mutex<Recording>,
    changed: Notify,
}

impl RecordingFrontend {
    /// Starts the mirror from `initial` (usually the serialized initial state).
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Mutex::new(Recording {
                mirror: initial,
                ..Recording::default()
            }),
            changed: Notify::new(),
        }
    }

    /// Copy of everything recorded.
    pub fn snapshot(&self) -> Recording {
        self.lock().clone()
    }

    pub fn mirror(&self) -> Value {
        self.lock().mirror.clone()
    }

    pub fn batches(&self) -> Vec<Vec<Patch>> {
        self.lock().batches.clone()
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.lock().publications.clone()
    }

    /// Waits until `pred` holds for the recording.
    pub async fn wait_until(&self, mut pred: impl FnMut(&Recording) -> bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if pred(&*self.lock()) {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Frontend for RecordingFrontend {
    fn patch_state(&self, patches: Vec<Patch>) {
        {
            let mut rec = self.lock();
            if let Err(e) = apply_patches(&mut rec.mirror, &patches) {
                tracing::warn!(error = %e, "recorded patch batch does not apply to mirror");
                rec.patch_errors += 1;
            }
            rec.batches.push(patches);
        }
        self.changed.notify_waiters();
    }

    fn publish(&self, publication: Publication) {
        self.lock().publications.push(publication);
        self.changed.notify_waiters();
    }
}
