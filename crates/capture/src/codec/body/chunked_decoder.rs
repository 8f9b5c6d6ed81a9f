//! Decoder for chunked transfer encoding, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! Captured traffic arrives in arbitrary segment sizes, so the framing around the chunk
//! data is consumed one byte at a time and the decoder can stop and resume at any
//! offset. Chunk data itself is split off in as large pieces as are available.
//!
//! A bare LF is tolerated wherever CRLF is expected. Chunk extensions and trailer
//! fields are skipped.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining_size: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// LF ending the size line
    SizeLf,
    /// Chunk data
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// Trailer field after the last chunk
    Trailer,
    TrailerLf,
    /// CR of the final empty line
    EndCr,
    EndLf,
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes as far as `src` allows, resuming wherever the previous call stopped.
    ///
    /// # Returns
    /// * `Ok(Some(PayloadItem::Chunk(bytes)))` for chunk data
    /// * `Ok(Some(PayloadItem::Eof))` after the last chunk and trailers
    /// * `Ok(None)` when more data is needed
    /// * `Err(ParseError)` for an invalid size line or missing line ending
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }

                Body => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = cmp::min(self.remaining_size, src.len() as u64) as usize;
                    let bytes = src.split_to(len).freeze();
                    self.remaining_size -= len as u64;
                    if self.remaining_size == 0 {
                        self.state = BodyCr;
                    }

                    trace!(len, "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                state => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    self.state = state.advance(src.get_u8(), &mut self.remaining_size)?;
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::incomplete_body(format!("stream ended in chunked body at {:?}", self.state))),
        }
    }
}

impl ChunkedState {
    /// Consumes one framing byte and returns the next state.
    fn advance(self, byte: u8, size: &mut u64) -> Result<ChunkedState, ParseError> {
        let next = match (self, byte) {
            (Size, b @ (b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F')) => {
                // to_digit cannot fail on the matched range
                let digit = u64::from((b as char).to_digit(16).unwrap_or_default());
                *size = size
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_chunk("chunk size overflow"))?;
                Size
            }
            (Size | SizeLws, b'\t' | b' ') => SizeLws,
            (Size | SizeLws, b';') => Extension,
            (Size | SizeLws | Extension, b'\r') => SizeLf,
            (Size | SizeLws | Extension | SizeLf, b'\n') => after_size(*size),
            (Size, _) => return Err(ParseError::invalid_chunk("invalid chunk size")),
            (SizeLws, _) => return Err(ParseError::invalid_chunk("invalid chunk size linear white space")),
            (Extension, _) => Extension,
            (SizeLf, _) => return Err(ParseError::invalid_chunk("invalid chunk size LF")),

            (BodyCr, b'\r') => BodyLf,
            (BodyCr | BodyLf, b'\n') => Size,
            (BodyCr, _) => return Err(ParseError::invalid_chunk("missing CRLF after chunk data")),
            (BodyLf, _) => return Err(ParseError::invalid_chunk("invalid chunk body LF")),

            (Trailer, b'\r') => TrailerLf,
            (Trailer | TrailerLf, b'\n') => EndCr,
            (Trailer, _) => Trailer,
            (TrailerLf, _) => return Err(ParseError::invalid_chunk("invalid trailer end LF")),

            (EndCr, b'\r') => EndLf,
            (EndCr | EndLf, b'\n') => End,
            (EndCr, _) => Trailer,
            (EndLf, _) => return Err(ParseError::invalid_chunk("invalid chunk end LF")),

            (state @ (Body | End), _) => state,
        };
        Ok(next)
    }
}

fn after_size(size: u64) -> ChunkedState {
    if size == 0 { EndCr } else { Body }
}
