use std::sync::atomic::{AtomicUsize, Ordering};

use crate::frontend::{Publication, Publisher};

/// Observer of an engine's outstanding request count.
pub trait LoadingTracker: Send + Sync {
    /// A request was queued.
    fn begin_loading(&self);
    /// A request settled (resolved or rejected).
    fn end_loading(&self);
}

/// Publishes [`Publication::Loading`] on every change.
///
/// One tracker may be shared by several engines; the count is the sum.
pub struct PublishingTracker {
    pending: AtomicUsize,
    publisher: Publisher,
}

impl PublishingTracker {
    pub fn new(publisher: Publisher) -> Self {
        Self {
            pending: AtomicUsize::new(0),
            publisher,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

impl LoadingTracker for PublishingTracker {
    fn begin_loading(&self) {
        let pending = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        self.publisher.publish(Publication::Loading { pending });
    }

    fn end_loading(&self) {
        let pending = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .map_or(0, |prev| prev.saturating_sub(1));
        self.publisher.publish(Publication::Loading { pending });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::frontend::RecordingFrontend;

    #[test]
    fn test_counts_are_published() {
        let frontend = Arc::new(RecordingFrontend::default());
        let tracker = PublishingTracker::new(Publisher::new(frontend.clone()));

        tracker.begin_loading();
        tracker.begin_loading();
        tracker.end_loading();
        tracker.end_loading();
        tracker.end_loading();

        let pending: Vec<usize> = frontend
            .publications()
            .into_iter()
            .filter_map(|p| match p {
                Publication::Loading { pending } => Some(pending),
                _ => None,
            })
            .collect();
        assert_eq!(pending, vec![1, 2, 1, 0, 0]);
        assert_eq!(tracker.pending(), 0);
    }
}
