use bytes::{BufMut, BytesMut};

use crate::protocol::dump::DumpOptions;
use crate::protocol::{Request, Response};

/// A request and the response that answered it, emitted once per captured exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    flow_id: u64,
    request: Request,
    response: Response,
}

impl Exchange {
    pub fn new(flow_id: u64, request: Request, response: Response) -> Self {
        Self { flow_id, request, response }
    }

    /// Diagnostic id of the flow that carried this exchange.
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }

    /// One line summary for list views, e.g. `[  3] GET  /index.html`.
    pub fn summary(&self, index: usize) -> String {
        format!("[{index:3}] {:<4} {}", self.request.method().as_str(), self.request.target())
    }

    /// Renders the request followed by the response.
    pub fn write_to(&self, dst: &mut BytesMut, options: &DumpOptions) {
        self.request.write_to(dst, options);
        dst.put_slice(b"\r\n");
        self.response.write_to(dst, options);
    }
}
