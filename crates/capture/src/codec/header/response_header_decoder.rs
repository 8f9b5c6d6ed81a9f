//! Response header decoder for captured server-to-client traffic
//!
//! The status line is parsed by hand, leniently: the protocol token ends at the first
//! space, the rest is `code reason` split at the next space, and a missing reason is
//! accepted. The code must be exactly three ASCII digits. The header block that follows
//! is parsed with `httparse::parse_headers`.
//!
//! How the body is framed depends on the request being answered, so the decoder has to
//! be told the request method before each response.

use bytes::{Buf, BytesMut};
use http::{Method, StatusCode, header};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use super::{MAX_HEADER_BYTES, MAX_HEADER_NUM, is_chunked, skip_empty_lines, to_header_map};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ResponseHeader, content_length};

const PROTOCOL_PREFIX: &[u8] = b"HTTP/";

/// Decoder for HTTP response headers implementing the [`Decoder`] trait.
#[derive(Debug)]
pub struct ResponseHeaderDecoder {
    request_method: Method,
}

impl ResponseHeaderDecoder {
    pub fn new() -> Self {
        Self { request_method: Method::GET }
    }

    /// Sets the method of the request the next response answers.
    ///
    /// # Arguments
    /// * `method` - A `HEAD` request makes the response bodyless whatever its headers say
    pub fn set_request_method(&mut self, method: Method) {
        self.request_method = method;
    }
}

impl Default for ResponseHeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ResponseHeaderDecoder {
    type Item = (ResponseHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a status line and header block from `src`.
    ///
    /// # Returns
    /// * `Ok(Some((header, payload_size)))` when a complete header block was parsed
    /// * `Ok(None)` when more data is needed
    /// * `Err(ParseError)` if the status line or headers are malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        skip_empty_lines(src);

        let Some(line_end) = src.iter().position(|b| *b == b'\n') else {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        };
        let line = src[..line_end].strip_suffix(b"\r").unwrap_or(&src[..line_end]);
        let (protocol, status, reason) = parse_status_line(line)?;

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let (header_end, parsed_headers) = match httparse::parse_headers(&src[line_end + 1..], &mut headers) {
            Ok(Status::Complete((offset, parsed_headers))) => (line_end + 1 + offset, parsed_headers),
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => return Err(ParseError::too_many_headers(MAX_HEADER_NUM)),
            Err(e) => return Err(ParseError::invalid_header(e)),
        };
        trace!(header_size = header_end, status, "parsed response header");
        ensure!(header_end <= MAX_HEADER_BYTES, ParseError::too_large_header(header_end, MAX_HEADER_BYTES));

        let header = ResponseHeader::new(protocol, status, reason, to_header_map(parsed_headers)?);
        src.advance(header_end);

        let payload_size = payload_size(&self.request_method, &header)?;
        Ok(Some((header, payload_size)))
    }
}

/// Splits a status line into protocol, status code and reason phrase.
fn parse_status_line(line: &[u8]) -> Result<(String, u16, String), ParseError> {
    let space = line.iter().position(|b| *b == b' ').ok_or_else(|| ParseError::malformed_status_line(line))?;
    let protocol = &line[..space];
    ensure!(protocol.starts_with(PROTOCOL_PREFIX), ParseError::malformed_status_line(line));

    let rest = line[space + 1..].trim_ascii_start();
    let (code, reason) = match rest.iter().position(|b| *b == b' ') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &b""[..]),
    };

    ensure!(code.len() == 3 && code.iter().all(u8::is_ascii_digit), ParseError::malformed_status_code(code));
    let status = code.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));

    Ok((String::from_utf8_lossy(protocol).into_owned(), status, String::from_utf8_lossy(reason).into_owned()))
}

/// Determines how the response body is framed, in order of precedence:
/// no body for HEAD, 1xx, 204 and 304; chunked; Content-Length; until the stream closes.
fn payload_size(request_method: &Method, header: &ResponseHeader) -> Result<PayloadSize, ParseError> {
    let status = header.status();
    if request_method == Method::HEAD
        || (100..200).contains(&status)
        || status == StatusCode::NO_CONTENT.as_u16()
        || status == StatusCode::NOT_MODIFIED.as_u16()
    {
        return Ok(PayloadSize::Empty);
    }

    if is_chunked(header.headers().get_all(header::TRANSFER_ENCODING).iter().next_back()) {
        return Ok(PayloadSize::Chunked);
    }

    match content_length(header.headers())? {
        Some(0) => Ok(PayloadSize::Empty),
        Some(length) => Ok(PayloadSize::Length(length)),
        None => Ok(PayloadSize::UntilClose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(str: &str) -> Result<Option<(ResponseHeader, PayloadSize)>, ParseError> {
        ResponseHeaderDecoder::new().decode(&mut BytesMut::from(str))
    }

    #[test]
    fn from_nginx() {
        let str = indoc! {r##"
        HTTP/1.1 404 Not Found
        Server: nginx/1.25.3
        Content-Type: text/html
        Content-Length: 153

        <html>"##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = ResponseHeaderDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.protocol(), "HTTP/1.1");
        assert_eq!(header.status(), 404);
        assert_eq!(header.reason(), "Not Found");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(payload_size, PayloadSize::Length(153));
        assert_eq!(&buf[..], b"<html>");
    }

    #[test]
    fn missing_reason() {
        let (header, payload_size) = decode("HTTP/1.1 200\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.status(), 200);
        assert_eq!(header.reason(), "");
        assert_eq!(payload_size, PayloadSize::UntilClose);
    }

    #[test]
    fn malformed_status_code() {
        assert!(matches!(decode("HTTP/1.1 2x0 OK\r\n\r\n"), Err(ParseError::MalformedStatusCode { .. })));
        assert!(matches!(decode("HTTP/1.1 2000 OK\r\n\r\n"), Err(ParseError::MalformedStatusCode { .. })));
        assert!(matches!(decode("HTTP/1.1 -20 OK\r\n\r\n"), Err(ParseError::MalformedStatusCode { .. })));
    }

    #[test]
    fn malformed_status_line() {
        assert!(matches!(decode("HTTP/1.1\r\n\r\n"), Err(ParseError::MalformedStatusLine { .. })));
        assert!(matches!(decode("garbage 200 OK\r\n\r\n"), Err(ParseError::MalformedStatusLine { .. })));
    }

    #[test]
    fn partial_status_line() {
        assert!(decode("HTTP/1.1 200 O").unwrap().is_none());
        assert!(decode("HTTP/1.1 200 OK\r\nContent-Le").unwrap().is_none());
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let (_, payload_size) = decode("HTTP/1.1 200 OK\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Chunked);
    }

    #[test]
    fn bodyless_responses() {
        let mut decoder = ResponseHeaderDecoder::new();
        decoder.set_request_method(Method::HEAD);
        let (_, payload_size) = decoder.decode(&mut BytesMut::from("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n")).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);

        for status_line in ["HTTP/1.1 204 No Content", "HTTP/1.1 304 Not Modified", "HTTP/1.1 101 Switching Protocols"] {
            let (_, payload_size) = decode(&format!("{status_line}\r\nContent-Length: 10\r\n\r\n")).unwrap().unwrap();
            assert_eq!(payload_size, PayloadSize::Empty);
        }
    }
}
