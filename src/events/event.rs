//! # Runtime events emitted by the dispatcher, controllers and engines.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Dispatch events**: action application and loop progress (applied, rejected, iteration, quiescent, livelock)
//! - **Controller events**: tree reconciliation (created, destroyed)
//! - **Engine events**: request pipeline health (request failed, aborted, mode selected)
//! - **Runtime events**: subscriber health and shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps, controller id,
//! action name, iteration counters and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use tracectl::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ActionRejected)
//!     .with_action("DeleteQuery")
//!     .with_reason("unknown query id")
//!     .with_iteration(3);
//!
//! assert_eq!(ev.kind, EventKind::ActionRejected);
//! assert_eq!(ev.action.as_deref(), Some("DeleteQuery"));
//! assert_eq!(ev.iteration, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Dispatch events ===
    /// An action was applied to the state.
    ///
    /// Sets:
    /// - `action`: action name
    /// - `count`: number of structural patches it produced
    /// - `iteration`: loop iteration (1-based)
    ActionApplied,

    /// A state transform refused an action; state is untouched.
    ///
    /// Sets:
    /// - `action`: action name
    /// - `reason`: rejection message
    /// - `iteration`: loop iteration (1-based)
    ActionRejected,

    /// One pass of the dispatch loop finished.
    ///
    /// Sets:
    /// - `iteration`: loop iteration (1-based)
    /// - `count`: 1 if the controller tree requested a re-run, else 0
    IterationCompleted,

    /// The dispatch loop settled and delivered its patch batch.
    ///
    /// Sets:
    /// - `iteration`: total iterations of this cycle
    /// - `count`: number of patches delivered
    Quiescent,

    /// The dispatch loop exceeded its iteration ceiling (fatal).
    ///
    /// Sets:
    /// - `iteration`: iterations executed
    LivelockDetected,

    // === Controller events ===
    /// A child controller was constructed from its spec.
    ///
    /// Sets:
    /// - `controller`: child id
    /// - `reason`: parent id
    ControllerCreated,

    /// A controller disappeared from its parent's declaration and was destroyed.
    ///
    /// Sets:
    /// - `controller`: child id
    /// - `reason`: parent id
    ControllerDestroyed,

    // === Engine events ===
    /// A single engine request was rejected; the queue continues.
    ///
    /// Sets:
    /// - `engine`: engine id
    /// - `request`: request id
    /// - `action`: engine method
    /// - `reason`: failure message
    EngineRequestFailed,

    /// The engine was marked aborted; every later request rejects.
    ///
    /// Sets:
    /// - `engine`: engine id
    /// - `reason`: abort message
    EngineAborted,

    /// A transport was selected for a new engine.
    ///
    /// Sets:
    /// - `engine`: engine id
    /// - `reason`: selected mode
    EngineModeSelected,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `controller`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `controller`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Controller (or subscriber) id, if applicable.
    pub controller: Option<Arc<str>>,
    /// Action or engine method name.
    pub action: Option<Arc<str>>,
    /// Engine id.
    pub engine: Option<Arc<str>>,
    /// Engine request id.
    pub request: Option<u64>,
    /// Dispatch loop iteration.
    pub iteration: Option<u32>,
    /// Kind-specific counter (patches, re-run flag, ...).
    pub count: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            controller: None,
            action: None,
            engine: None,
            request: None,
            iteration: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a controller id.
    #[inline]
    pub fn with_controller(mut self, id: impl Into<Arc<str>>) -> Self {
        self.controller = Some(id.into());
        self
    }

    /// Attaches an action (or engine method) name.
    #[inline]
    pub fn with_action(mut self, name: impl Into<Arc<str>>) -> Self {
        self.action = Some(name.into());
        self
    }

    /// Attaches an engine id.
    #[inline]
    pub fn with_engine(mut self, id: impl Into<Arc<str>>) -> Self {
        self.engine = Some(id.into());
        self
    }

    /// Attaches an engine request id.
    #[inline]
    pub fn with_request(mut self, id: u64) -> Self {
        self.request = Some(id);
        self
    }

    /// Attaches a loop iteration (saturates at `u32::MAX`).
    #[inline]
    pub fn with_iteration(mut self, n: usize) -> Self {
        self.iteration = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n as u64);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_controller(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_controller(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
