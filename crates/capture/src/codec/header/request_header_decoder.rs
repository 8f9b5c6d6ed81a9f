//! Request header decoder for captured client-to-server traffic
//!
//! The request line and header block are parsed with `httparse`. Parse failures are
//! split into request line errors and header errors so a stream worker can log what
//! went wrong before resynchronizing.
//!
//! # Limits
//!
//! - Maximum number of headers: [`MAX_HEADER_NUM`]
//! - Maximum header block size: [`MAX_HEADER_BYTES`]
//! - Only HTTP/1.0 and HTTP/1.1 request lines are accepted
//!
//! The request body is framed by Content-Length only; a request without it (or with
//! a value of 0) has an empty body and no payload bytes are read.

use bytes::{Buf, BytesMut};
use http::{Method, Version, header};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::{MAX_HEADER_BYTES, MAX_HEADER_NUM, skip_empty_lines, to_header_map};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Default)]
pub struct RequestHeaderDecoder;

impl Decoder for RequestHeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a request line and header block from `src`.
    ///
    /// # Arguments
    /// * `src` - Captured client bytes; consumed up to the end of the header block on success
    ///
    /// # Returns
    /// * `Ok(Some((header, payload_size)))` when a complete header block was parsed
    /// * `Ok(None)` until the empty line ending the header block has arrived
    /// * `Err(ParseError)` for a malformed request line, invalid or duplicate headers,
    ///   or a header block over [`MAX_HEADER_BYTES`]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        skip_empty_lines(src);
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(&src[..]).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::HeaderName | Error::HeaderValue => ParseError::invalid_header(e),
            e => ParseError::malformed_request_line(e),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(header_size = body_offset, "parsed request header");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let method = req.method.ok_or_else(|| ParseError::malformed_request_line("missing method"))?;
        let method = Method::from_bytes(method.as_bytes()).map_err(ParseError::malformed_request_line)?;
        let target = req.path.ok_or_else(|| ParseError::malformed_request_line("missing target"))?.to_owned();
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::malformed_request_line(format!("unsupported http version {v:?}"))),
        };

        let headers = to_header_map(req.headers)?;
        ensure!(headers.get_all(header::HOST).iter().count() <= 1, ParseError::DuplicateHostHeader);

        let header = RequestHeader::new(method, target, version, headers)?;
        src.advance(body_offset);

        let payload_size = match header.content_length() {
            0 => PayloadSize::Empty,
            length => PayloadSize::Length(length),
        };
        Ok(Some((header, payload_size)))
    }
}
