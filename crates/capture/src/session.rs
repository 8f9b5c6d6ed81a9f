//! The capture session: turns a stream of [`FlowEvent`]s into exchanges.
//!
//! A [`Session`] owns the buffer pool, the flow dispatcher and the handler chain. Its
//! [`run`](Session::run) loop consumes events until the event source is exhausted or
//! the session is cancelled, then closes every flow and waits for the stream workers to
//! finish the bytes they already hold.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::flow::FlowEvent;
use crate::flow::dispatcher::Dispatcher;
use crate::handler::{ExchangeHandler, FilteredHandler};
use crate::pool::{BufferPool, PoolStats};
use crate::protocol::SetupError;

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Flows admitted over the life of the session
    pub flows: u64,
    pub pool: PoolStats,
}

pub struct Session {
    config: CaptureConfig,
    pool: Arc<BufferPool>,
    tracker: TaskTracker,
    dispatcher: Dispatcher,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("config", &self.config).field("pool", &self.pool).finish_non_exhaustive()
    }
}

impl Session {
    /// Validates `config` and prepares a session that forwards exchanges accepted by the
    /// host filter to `handler`.
    pub fn new<H: ExchangeHandler>(config: CaptureConfig, handler: H) -> Result<Self, SetupError> {
        config.validate()?;

        let pool = Arc::new(BufferPool::new());
        let tracker = TaskTracker::new();
        let handler: Arc<dyn ExchangeHandler> = Arc::new(FilteredHandler::new(config.filter.host_filter(), handler));
        let dispatcher = Dispatcher::new(
            Arc::clone(&pool),
            config.filter.clone(),
            handler,
            tracker.clone(),
            config.response_timeout(),
            config.idle_timeout(),
        );

        info!(expression = %config.filter.capture_expression(), host = %config.filter.host, "capture session created");
        Ok(Self { config, pool, tracker, dispatcher })
    }

    /// The expression the external capture source should be configured with.
    pub fn capture_expression(&self) -> String {
        self.config.filter.capture_expression()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Runs the dispatch loop until `events` is exhausted or `cancel` fires.
    ///
    /// On exit every flow is closed and the call waits for all stream workers to finish
    /// before draining the buffer pool.
    pub async fn run(mut self, mut events: mpsc::Receiver<FlowEvent>, cancel: CancellationToken) -> SessionReport {
        let mut sweep = interval(self.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        sweep.tick().await;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("capture cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatcher.dispatch(event).await,
                    None => {
                        info!("event source exhausted");
                        break;
                    }
                },
                _ = sweep.tick() => {
                    let closed = self.dispatcher.sweep(Instant::now());
                    debug!(closed, live = self.dispatcher.flow_count(), "idle sweep");
                }
            }
        }

        self.dispatcher.shutdown();
        self.tracker.close();
        debug!(workers = self.tracker.len(), "waiting for stream workers");
        self.tracker.wait().await;

        self.pool.drain();
        let report = SessionReport { flows: self.dispatcher.flows_seen(), pool: self.pool.stats() };
        info!(flows = report.flows, "capture session finished");
        report
    }
}
