//! Captured HTTP requests.
//!
//! A request is decoded in two steps: the [`RequestHeader`] is produced by the
//! request decoder, then the stream worker attaches the collected [`Body`], the
//! per-flow sequence number and the client address to form a [`Request`].

use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, Method, Version, header};

use crate::protocol::dump::{DumpOptions, write_body, write_headers, write_version};
use crate::protocol::{Body, ParseError};

/// Start line and header block of a captured request.
///
/// The target is kept verbatim: captured traffic is not guaranteed to contain
/// URIs that `http::Uri` would accept.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    content_length: u64,
}

impl RequestHeader {
    pub(crate) fn new(method: Method, target: String, version: Version, headers: HeaderMap) -> Result<Self, ParseError> {
        let content_length = content_length(&headers)?.unwrap_or(0);
        Ok(Self { method, target, version, headers, content_length })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the value of the Host header, or an empty string if absent.
    pub fn host(&self) -> &str {
        self.headers.get(header::HOST).and_then(|v| v.to_str().ok()).unwrap_or_default()
    }

    /// Declared Content-Length; 0 when the header is absent.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Returns true if the request asks to switch the connection to websocket.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers.get_all(header::UPGRADE).iter().any(|value| value.as_bytes().eq_ignore_ascii_case(b"websocket"))
    }
}

/// A fully captured request: header, body and the endpoint that sent it.
#[derive(Debug, Clone)]
pub struct Request {
    header: RequestHeader,
    body: Body,
    seq: u64,
    peer: SocketAddr,
}

impl Request {
    pub fn new(header: RequestHeader, body: Body, seq: u64, peer: SocketAddr) -> Self {
        Self { header, body, seq, peer }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn target(&self) -> &str {
        self.header.target()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn host(&self) -> &str {
        self.header.host()
    }

    /// Number of body bytes, as established by Content-Length.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Position of this request within its flow, starting at 1.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Address of the client that sent the request.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Renders the request line, headers and body for display.
    pub fn write_to(&self, dst: &mut BytesMut, options: &DumpOptions) {
        dst.put_slice(self.method().as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.target().as_bytes());
        dst.put_u8(b' ');
        write_version(dst, self.version());
        dst.put_slice(b"\r\n");
        write_headers(dst, self.headers());
        write_body(dst, &self.body, options);
    }
}

/// Parses the Content-Length header, if any.
///
/// Repeated headers are accepted only when all values agree.
pub(crate) fn content_length(headers: &HeaderMap) -> Result<Option<u64>, ParseError> {
    let mut length = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        let cl_str = value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
        let parsed =
            cl_str.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

        match length {
            Some(previous) if previous != parsed => {
                return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}
