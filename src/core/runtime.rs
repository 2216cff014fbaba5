//! # Runtime: wires the event bus, subscribers and a dispatcher together.
//!
//! ```text
//! Runtime::run(dispatcher, token)
//!   ├─► subscriber_listener(): Bus.subscribe() ──► SubscriberSet::emit(&Event)
//!   └─► select!
//!         ├─ shutdown_signal() ──► publish(ShutdownRequested) ──► token.cancel() ──► wait for the dispatcher
//!         └─ dispatcher.run(token) ──► Ok on cancel, Err on a fatal dispatch error
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::builder::RuntimeBuilder;
use super::config::Config;
use super::shutdown::shutdown_signal;
use crate::controller::ChildSpec;
use crate::dispatch::{Dispatcher, Model};
use crate::error::{DispatchError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::frontend::Frontend;
use crate::subscribers::SubscriberSet;

/// Owns the event plumbing shared by dispatchers and engines.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
}

impl Runtime {
    /// Starts building a runtime. `build()` must be called inside a tokio runtime.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, bus: Bus, subs: Arc<SubscriberSet>) -> Self {
        Self { cfg, bus, subs }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Creates a dispatcher publishing on this runtime's bus.
    pub fn dispatcher<M: Model>(
        &self,
        initial: M::State,
        root: ChildSpec<M>,
        frontend: Arc<dyn Frontend>,
    ) -> Result<Dispatcher<M>, DispatchError> {
        Dispatcher::new(&self.cfg, initial, root, frontend, self.bus.clone())
    }

    /// Drives `dispatcher` until `token` is cancelled, a termination signal
    /// arrives or a fatal dispatch error occurs.
    ///
    /// The controller tree is always destroyed before this returns.
    pub async fn run<M: Model>(
        &self,
        dispatcher: Dispatcher<M>,
        token: CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.subscriber_listener();

        let drive = dispatcher.run(token.clone());
        tokio::pin!(drive);

        tokio::select! {
            outcome = &mut drive => Ok(outcome?),
            signal = shutdown_signal() => {
                match &signal {
                    Ok(name) => {
                        tracing::info!(signal = name, "shutdown requested");
                        self.bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(*name));
                    }
                    Err(e) => tracing::error!(error = %e, "cannot listen for termination signals"),
                }
                token.cancel();
                drive.await?;
                signal.map(|_| ()).map_err(RuntimeError::from)
            }
        }
    }

    /// Forwards bus events to the subscriber set until the bus closes.
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::frontend::RecordingFrontend;
    use crate::subscribers::Subscribe;
    use crate::testing::{Counter, CounterAction, CounterModel, idle_root, restless_root};

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let collect = Arc::new(Collect::default());
        let sub: Arc<dyn Subscribe> = collect.clone();
        let runtime = Runtime::builder(Config::default())
            .with_subscribers(vec![sub])
            .build();
        let frontend = Arc::new(RecordingFrontend::new(json!({"value": 0, "notes": []})));
        let dispatcher = runtime
            .dispatcher::<CounterModel>(Counter::default(), idle_root(), frontend.clone())
            .unwrap();
        let handle = dispatcher.handle();
        let token = CancellationToken::new();

        let stop = token.clone();
        let driver = tokio::spawn(async move {
            handle.dispatch(CounterAction::Add(3)).unwrap();
            frontend.wait_until(|r| r.mirror["value"] == json!(3)).await;
            stop.cancel();
        });

        runtime.run(dispatcher, token).await.unwrap();
        driver.await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !collect.0.lock().unwrap().contains(&EventKind::ControllerDestroyed) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let seen = collect.0.lock().unwrap().clone();
        assert!(seen.contains(&EventKind::ActionApplied));
        assert!(seen.contains(&EventKind::Quiescent));
    }

    #[tokio::test]
    async fn test_fatal_dispatch_error_is_returned() {
        let cfg = Config {
            max_iterations: 1,
            ..Config::default()
        };
        let runtime = Runtime::builder(cfg).build();
        let frontend = Arc::new(RecordingFrontend::new(json!({"value": 0, "notes": []})));
        let dispatcher = runtime
            .dispatcher::<CounterModel>(Counter::default(), restless_root(), frontend)
            .unwrap();

        let err = runtime.run(dispatcher, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "dispatch_livelock");
    }
}
