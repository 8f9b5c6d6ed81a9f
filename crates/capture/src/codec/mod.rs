//! HTTP codec module for decoding captured HTTP messages
//!
//! Both directions of a flow are decoded with streaming [`Decoder`](tokio_util::codec::Decoder)
//! implementations that yield a header block first and then the body piece by piece:
//!
//! - [`RequestDecoder`]: client-to-server messages, bodies framed by Content-Length
//! - [`ResponseDecoder`]: server-to-client messages, bodies framed by the request method,
//!   the status code, chunked encoding, Content-Length or the end of the stream
//!
//! Header blocks are parsed by the `header` module, bodies by the `body` module.

mod body;
mod header;
mod message_decoder;

pub use header::{RequestHeaderDecoder, ResponseHeaderDecoder};
pub use message_decoder::{MessageDecoder, RequestDecoder, ResponseDecoder};
