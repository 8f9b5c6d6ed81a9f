//! HTTP header block decoding for captured requests and responses
//!
//! - [`RequestHeaderDecoder`]: request line and headers, parsed with `httparse`
//! - [`ResponseHeaderDecoder`]: status line (parsed leniently by hand) and headers
//!
//! Both decoders skip blank lines in front of a start line, enforce the same size
//! limits, and decide how the body that follows is framed.

mod request_header_decoder;
mod response_header_decoder;

pub use request_header_decoder::RequestHeaderDecoder;
pub use response_header_decoder::ResponseHeaderDecoder;

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::protocol::ParseError;

/// Maximum number of headers allowed in a message
pub(crate) const MAX_HEADER_NUM: usize = 96;

/// Maximum size in bytes allowed for the start line plus header block
pub(crate) const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Drops CRLF / LF sequences that precede a start line.
fn skip_empty_lines(src: &mut BytesMut) {
    loop {
        if src.starts_with(b"\r\n") {
            src.advance(2);
        } else if src.starts_with(b"\n") {
            src.advance(1);
        } else {
            return;
        }
    }
}

/// Copies parsed `httparse` headers into an owned [`HeaderMap`], keeping duplicates.
fn to_header_map(headers: &[httparse::Header<'_>]) -> Result<HeaderMap, ParseError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
        map.append(name, value);
    }
    Ok(map)
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    header_value
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
