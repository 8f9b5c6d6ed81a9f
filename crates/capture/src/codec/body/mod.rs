//! Body decoding for captured requests and responses
//!
//! - [`PayloadDecoder`]: picks one of the strategies below from a header's framing
//! - `ChunkedDecoder`: chunked transfer encoding, resumable at any byte
//! - `LengthDecoder`: Content-Length bodies
//! - `UntilCloseDecoder`: responses delimited by the end of the stream

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;
mod until_close_decoder;

pub use payload_decoder::PayloadDecoder;
