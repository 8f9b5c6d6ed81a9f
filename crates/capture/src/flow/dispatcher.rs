use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::filter::FilterConfig;
use crate::flow::classifier::is_request_start;
use crate::flow::worker::StreamWorker;
use crate::flow::{Direction, FlowEvent, FlowKey};
use crate::handler::ExchangeHandler;
use crate::pipe::{PipeWriter, pipe};
use crate::pool::BufferPool;

/// Routes reassembled segments to per-flow pipes and owns the lifetime of every flow.
pub(crate) struct Dispatcher {
    flows: HashMap<FlowKey, Flow>,
    next_flow_id: u64,
    pool: Arc<BufferPool>,
    filter: FilterConfig,
    handler: Arc<dyn ExchangeHandler>,
    tracker: TaskTracker,
    response_timeout: Duration,
    idle_timeout: Duration,
}

struct Flow {
    id: u64,
    state: FlowState,
    last_seen: Instant,
}

enum FlowState {
    /// No client payload seen yet
    Unclassified,
    Http { upstream: PipeWriter, downstream: PipeWriter },
    /// Not HTTP; segments are dropped
    Opaque,
}

impl Flow {
    fn close(&self) {
        if let FlowState::Http { upstream, downstream } = &self.state {
            upstream.close();
            downstream.close();
        }
    }
}

impl Dispatcher {
    pub(crate) fn new(
        pool: Arc<BufferPool>,
        filter: FilterConfig,
        handler: Arc<dyn ExchangeHandler>,
        tracker: TaskTracker,
        response_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self { flows: HashMap::new(), next_flow_id: 1, pool, filter, handler, tracker, response_timeout, idle_timeout }
    }

    pub(crate) async fn dispatch(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::Segment { key, direction, payload } => self.on_segment(key, direction, payload).await,
            FlowEvent::Complete { key } => self.on_complete(&key),
        }
    }

    async fn on_segment(&mut self, key: FlowKey, direction: Direction, payload: Bytes) {
        let now = Instant::now();
        let flow = match self.flows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if !self.filter.admits(&key) {
                    trace!(flow = %key, "flow not admitted");
                    return;
                }
                let id = self.next_flow_id;
                self.next_flow_id += 1;
                debug!(flow_id = id, flow = %key, "new flow");
                entry.insert(Flow { id, state: FlowState::Unclassified, last_seen: now })
            }
        };
        flow.last_seen = now;

        if payload.is_empty() {
            return;
        }

        if matches!(flow.state, FlowState::Unclassified) {
            if direction == Direction::ServerToClient {
                return;
            }

            if is_request_start(&payload) {
                let (upstream, upstream_reader) = pipe(Arc::clone(&self.pool));
                let (downstream, downstream_reader) = pipe(Arc::clone(&self.pool));
                let worker = StreamWorker::new(
                    flow.id,
                    key,
                    upstream_reader,
                    downstream_reader,
                    Arc::clone(&self.handler),
                    self.response_timeout,
                );
                self.tracker.spawn(worker.run());
                flow.state = FlowState::Http { upstream, downstream };
                debug!(flow_id = flow.id, "flow classified as http");
            } else {
                flow.state = FlowState::Opaque;
                debug!(flow_id = flow.id, "flow classified as opaque");
            }
        }

        if let FlowState::Http { upstream, downstream } = &flow.state {
            let writer = match direction {
                Direction::ClientToServer => upstream,
                Direction::ServerToClient => downstream,
            };
            // a closed pipe means the worker stopped parsing this flow
            if let Err(e) = writer.put_bytes(&payload).await {
                trace!(flow_id = flow.id, cause = %e, len = payload.len(), "segment dropped");
            }
        }
    }

    fn on_complete(&mut self, key: &FlowKey) {
        if let Some(flow) = self.flows.remove(key) {
            flow.close();
            debug!(flow_id = flow.id, "flow completed");
        }
    }

    /// Tears down flows idle for longer than the idle timeout. Returns how many.
    pub(crate) fn sweep(&mut self, now: Instant) -> usize {
        let before = self.flows.len();
        let idle_timeout = self.idle_timeout;
        self.flows.retain(|_, flow| {
            let alive = now.saturating_duration_since(flow.last_seen) < idle_timeout;
            if !alive {
                flow.close();
                debug!(flow_id = flow.id, "idle flow closed");
            }
            alive
        });
        before - self.flows.len()
    }

    /// Closes every flow so that all workers finish.
    pub(crate) fn shutdown(&mut self) {
        for (_, flow) in self.flows.drain() {
            flow.close();
        }
    }

    pub(crate) fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Number of flows created so far.
    pub(crate) fn flows_seen(&self) -> u64 {
        self.next_flow_id - 1
    }
}
