//! Streaming decoder for whole HTTP messages
//!
//! [`MessageDecoder`] drives a header decoder and then a [`PayloadDecoder`] for the body
//! that follows. The same state machine serves both directions of a flow:
//!
//! - [`RequestDecoder`]: client-to-server messages
//! - [`ResponseDecoder`]: server-to-client messages, primed with the request method
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_capture::codec::RequestDecoder;
//! use micro_capture::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//!
//! let header = decoder.decode(&mut buffer).unwrap();
//! assert!(matches!(header, Some(Message::Header(_))));
//! ```

use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{RequestHeaderDecoder, ResponseHeaderDecoder};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize};

/// A decoder for one direction of a flow that handles both headers and payload.
///
/// The state lives in the `payload_decoder` field:
/// - `None`: currently parsing a header block
/// - `Some(PayloadDecoder)`: currently parsing the body of the last header
#[derive(Debug, Default)]
pub struct MessageDecoder<H> {
    header_decoder: H,
    payload_decoder: Option<PayloadDecoder>,
}

pub type RequestDecoder = MessageDecoder<RequestHeaderDecoder>;
pub type ResponseDecoder = MessageDecoder<ResponseHeaderDecoder>;

impl<H: Default> MessageDecoder<H> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> MessageDecoder<H> {
    /// Abandons a partially decoded body, so the next decode starts at a header block.
    pub fn reset(&mut self) {
        self.payload_decoder = None;
    }

    /// Returns true while a body is being decoded.
    pub fn in_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl ResponseDecoder {
    /// Tells the decoder which request the next response answers.
    pub fn set_request_method(&mut self, method: Method) {
        self.header_decoder.set_request_method(method);
    }
}

impl<H, T> MessageDecoder<H>
where
    H: Decoder<Item = (T, PayloadSize), Error = ParseError>,
{
    fn decode_payload(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Message<(T, PayloadSize)>>, ParseError> {
        let Some(payload_decoder) = &mut self.payload_decoder else {
            return Ok(None);
        };

        let item = if eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
        let message = match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(item @ PayloadItem::Eof) => {
                // the next message starts with a header block again
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            None => None,
        };
        Ok(message)
    }

    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<Message<(T, PayloadSize)>>, ParseError> {
        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };
        Ok(message)
    }
}

impl<H, T> Decoder for MessageDecoder<H>
where
    H: Decoder<Item = (T, PayloadSize), Error = ParseError>,
{
    type Item = Message<(T, PayloadSize)>;
    type Error = ParseError;

    /// Attempts to decode the next header block or payload item.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: a complete header block
    /// - `Ok(Some(Message::Payload(_)))`: a body chunk or the end of the body
    /// - `Ok(None)`: more data is needed
    /// - `Err(_)`: the bytes are not valid HTTP framing
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, false);
        }
        self.decode_header(src)
    }

    /// Decodes the remaining bytes once the stream has ended.
    ///
    /// Running out of bytes between messages returns `Ok(None)`; running out inside a
    /// header block or a framed body is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, true);
        }

        match self.decode_header(src)? {
            Some(message) => Ok(Some(message)),
            None if src.iter().all(|b| *b == b'\r' || *b == b'\n') => Ok(None),
            None => Err(ParseError::IncompleteHeader),
        }
    }
}
