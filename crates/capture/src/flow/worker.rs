use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::codec::{RequestHeaderDecoder, ResponseHeaderDecoder};
use crate::flow::FlowKey;
use crate::flow::classifier::{may_start_request, may_start_response};
use crate::flow::framed::FramedPipe;
use crate::handler::ExchangeHandler;
use crate::pipe::PipeReader;
use crate::protocol::{Exchange, PipeError, Request, Response, StreamError};

/// Turns the two pipes of an HTTP flow into request/response exchanges.
///
/// The worker alternates between waiting for a request on the client pipe and waiting
/// for the matching response on the server pipe. Malformed data in either direction is
/// skipped by resynchronizing that direction; the flow itself is never given up on
/// until a pipe closes.
pub(crate) struct StreamWorker {
    flow_id: u64,
    key: FlowKey,
    requests: FramedPipe<RequestHeaderDecoder>,
    responses: FramedPipe<ResponseHeaderDecoder>,
    handler: Arc<dyn ExchangeHandler>,
    response_timeout: Duration,
    next_seq: u64,
}

enum ResponseOutcome {
    Matched(Response),
    TimedOut,
    Closed,
}

impl StreamWorker {
    pub(crate) fn new(
        flow_id: u64,
        key: FlowKey,
        upstream: PipeReader,
        downstream: PipeReader,
        handler: Arc<dyn ExchangeHandler>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            flow_id,
            key,
            requests: FramedPipe::new(upstream),
            responses: FramedPipe::new(downstream),
            handler,
            response_timeout,
            next_seq: 1,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(flow_id = self.flow_id, flow = %self.key, "stream worker started");
        let mut exchanges = 0_u64;

        while let Some(request) = self.next_request().await {
            let upgrade = request.header().is_websocket_upgrade();

            match self.next_response(&request).await {
                ResponseOutcome::Matched(response) => {
                    let switched = upgrade && response.header().is_switching_protocols();
                    exchanges += 1;
                    self.handler.handle(Exchange::new(self.flow_id, request, response));

                    if switched {
                        debug!(flow_id = self.flow_id, "websocket upgrade accepted, stop parsing");
                        break;
                    }
                }
                ResponseOutcome::TimedOut => {}
                ResponseOutcome::Closed => break,
            }
        }

        self.requests.close();
        self.responses.close();
        debug!(flow_id = self.flow_id, exchanges, "stream worker finished");
    }

    async fn next_request(&mut self) -> Option<Request> {
        loop {
            match self.requests.read_message().await {
                Ok(Some((header, body))) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    trace!(flow_id = self.flow_id, seq, method = %header.method(), target = header.target(), "decoded request");
                    return Some(Request::new(header, body, seq, self.key.client));
                }
                Ok(None) => return None,
                Err(StreamError::Parse { source }) => {
                    let dropped = self.requests.resync(may_start_request);
                    debug!(flow_id = self.flow_id, dropped, cause = %source, "malformed request, resynchronizing");
                }
                Err(StreamError::Pipe { source }) => {
                    debug!(flow_id = self.flow_id, cause = %source, "request pipe failed");
                    return None;
                }
            }
        }
    }

    async fn next_response(&mut self, request: &Request) -> ResponseOutcome {
        let seq = request.seq();
        self.responses.set_request_method(request.method().clone());
        self.responses.set_read_deadline(Some(Instant::now() + self.response_timeout));

        let outcome = loop {
            match self.responses.read_message().await {
                Ok(Some((header, body))) => {
                    if header.status() / 100 == 1 && !header.is_switching_protocols() {
                        trace!(flow_id = self.flow_id, seq, status = header.status(), "skip interim response");
                        continue;
                    }
                    trace!(flow_id = self.flow_id, seq, status = header.status(), "decoded response");
                    break ResponseOutcome::Matched(Response::new(header, body, seq, self.key.server));
                }
                Ok(None) | Err(StreamError::Pipe { source: PipeError::Closed }) => break ResponseOutcome::Closed,
                Err(StreamError::Pipe { source: PipeError::DeadlineExceeded }) => {
                    debug!(flow_id = self.flow_id, seq, "no response before deadline, dropping request");
                    self.responses.discard();
                    break ResponseOutcome::TimedOut;
                }
                Err(StreamError::Parse { source }) => {
                    let dropped = self.responses.resync(may_start_response);
                    debug!(flow_id = self.flow_id, seq, dropped, cause = %source, "malformed response, resynchronizing");
                }
            }
        };

        self.responses.set_read_deadline(None);
        outcome
    }
}
