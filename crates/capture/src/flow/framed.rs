//! A pipe reader paired with a message decoder and a local read buffer.

use bytes::{Buf, BytesMut};
use http::Method;
use tokio::time::Instant;
use tokio_util::codec::Decoder;

use crate::codec::{MessageDecoder, ResponseHeaderDecoder};
use crate::pipe::PipeReader;
use crate::protocol::{Body, Message, ParseError, PayloadItem, PayloadSize, PipeError, StreamError};

const INITIAL_BUFFER_SIZE: usize = 4 * 1024;

/// Decodes messages from one direction of a flow.
///
/// Bytes are pulled from the pipe only when the decoder needs more of them. Once the
/// pipe reports closed, the rest of the local buffer is decoded with
/// [`Decoder::decode_eof`].
#[derive(Debug)]
pub(crate) struct FramedPipe<H> {
    reader: PipeReader,
    decoder: MessageDecoder<H>,
    buf: BytesMut,
    eof: bool,
}

impl<H, T> FramedPipe<H>
where
    H: Decoder<Item = (T, PayloadSize), Error = ParseError> + Default,
{
    pub(crate) fn new(reader: PipeReader) -> Self {
        Self { reader, decoder: MessageDecoder::new(), buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE), eof: false }
    }

    /// Returns the next header block or payload item, or `None` once the stream has
    /// ended cleanly between two messages.
    pub(crate) async fn next(&mut self) -> Result<Option<Message<(T, PayloadSize)>>, StreamError> {
        loop {
            if self.eof {
                return Ok(self.decoder.decode_eof(&mut self.buf)?);
            }

            if let Some(message) = self.decoder.decode(&mut self.buf)? {
                return Ok(Some(message));
            }

            match self.reader.read(&mut self.buf).await {
                Ok(_) => {}
                Err(PipeError::Closed) => self.eof = true,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads one complete message and collects its body.
    pub(crate) async fn read_message(&mut self) -> Result<Option<(T, Body)>, StreamError> {
        let header = loop {
            match self.next().await? {
                Some(Message::Header((header, _))) => break header,
                Some(Message::Payload(_)) => {}
                None => return Ok(None),
            }
        };

        let mut body = BytesMut::new();
        loop {
            match self.next().await? {
                Some(Message::Payload(PayloadItem::Chunk(bytes))) => body.extend_from_slice(&bytes),
                Some(Message::Payload(PayloadItem::Eof)) => break,
                Some(Message::Header(_)) | None => {
                    return Err(ParseError::incomplete_body("stream ended before the end of the body").into());
                }
            }
        }

        Ok(Some((header, Body::new(body.freeze()))))
    }

    /// Skips to the next line accepted by `is_boundary`, or drops everything buffered
    /// (locally and in the pipe) if there is none. The first buffered byte is always
    /// skipped so that the same failure cannot repeat.
    ///
    /// Returns the number of bytes dropped from the local buffer.
    pub(crate) fn resync(&mut self, is_boundary: fn(&[u8]) -> bool) -> usize {
        self.decoder.reset();

        let boundary = (1..self.buf.len()).find(|i| self.buf[i - 1] == b'\n' && is_boundary(&self.buf[*i..]));
        let dropped = match boundary {
            Some(offset) => {
                self.buf.advance(offset);
                offset
            }
            None => {
                let dropped = self.buf.len();
                self.discard();
                dropped
            }
        };
        self.reader.mark_abnormal();
        dropped
    }

    /// Drops all buffered bytes and any partially decoded message.
    pub(crate) fn discard(&mut self) {
        self.decoder.reset();
        self.buf.clear();
        self.reader.discard();
    }
}

impl<H> FramedPipe<H> {
    pub(crate) fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.reader.set_read_deadline(deadline);
    }

    pub(crate) fn close(&self) {
        self.reader.close();
    }
}

impl FramedPipe<ResponseHeaderDecoder> {
    pub(crate) fn set_request_method(&mut self, method: Method) {
        self.decoder.set_request_method(method);
    }
}
