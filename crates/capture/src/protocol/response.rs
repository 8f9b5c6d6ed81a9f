//! Captured HTTP responses.

use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, StatusCode, Version};

use crate::protocol::Body;
use crate::protocol::dump::{DumpOptions, write_body, write_headers};

/// Status line and header block of a captured response.
///
/// The protocol token is kept as it appeared on the wire; [`ResponseHeader::version`]
/// maps the usual ones onto [`http::Version`].
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    protocol: String,
    status: u16,
    reason: String,
    headers: HeaderMap,
}

impl ResponseHeader {
    pub(crate) fn new(protocol: String, status: u16, reason: String, headers: HeaderMap) -> Self {
        Self { protocol, status, reason, headers }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn version(&self) -> Option<Version> {
        match self.protocol.as_str() {
            "HTTP/0.9" => Some(Version::HTTP_09),
            "HTTP/1.0" => Some(Version::HTTP_10),
            "HTTP/1.1" => Some(Version::HTTP_11),
            "HTTP/2" | "HTTP/2.0" => Some(Version::HTTP_2),
            _ => None,
        }
    }

    /// The three digit status code as sent.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    /// The reason phrase following the status code; may be empty.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns true if the server accepted a protocol switch.
    pub fn is_switching_protocols(&self) -> bool {
        self.status == StatusCode::SWITCHING_PROTOCOLS.as_u16()
    }
}

/// A fully captured response, associated with the request it answers by sequence number.
#[derive(Debug, Clone)]
pub struct Response {
    header: ResponseHeader,
    body: Body,
    request_seq: u64,
    peer: SocketAddr,
}

impl Response {
    pub fn new(header: ResponseHeader, body: Body, request_seq: u64, peer: SocketAddr) -> Self {
        Self { header, body, request_seq, peer }
    }

    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    pub fn status(&self) -> u16 {
        self.header.status()
    }

    pub fn reason(&self) -> &str {
        self.header.reason()
    }

    pub fn protocol(&self) -> &str {
        self.header.protocol()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    /// Number of body bytes, as established by the body framing.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Sequence number of the request this response answers.
    pub fn request_seq(&self) -> u64 {
        self.request_seq
    }

    /// Address of the server that sent the response.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Renders the status line, headers and body for display.
    pub fn write_to(&self, dst: &mut BytesMut, options: &DumpOptions) {
        dst.put_slice(self.protocol().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(format!("{:03}", self.status()).as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.reason().as_bytes());
        dst.put_slice(b"\r\n");
        write_headers(dst, self.headers());
        write_body(dst, &self.body, options);
    }
}
