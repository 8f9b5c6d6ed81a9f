//! Display rendering of captured messages.
//!
//! Messages are rendered the way they appeared on the wire: start line, one
//! `Name: value` line per header and the body. Binary bodies are rendered as a
//! `hexdump -C` style listing instead of raw bytes.

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, Version};

use crate::protocol::Body;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Bytes rendered per hex dump line
const DUMP_WIDTH: usize = 16;

/// Controls how message bodies are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Bodies longer than this are left out; headers are still rendered.
    pub max_body_len: Option<usize>,
}

impl DumpOptions {
    /// Threshold used by [`DumpOptions::compact`].
    pub const LARGE_BODY_THRESHOLD: usize = 1024;

    /// Renders every body regardless of its size.
    pub fn full() -> Self {
        Self { max_body_len: None }
    }

    /// Leaves out bodies larger than [`DumpOptions::LARGE_BODY_THRESHOLD`].
    pub fn compact() -> Self {
        Self { max_body_len: Some(Self::LARGE_BODY_THRESHOLD) }
    }
}

pub(crate) fn write_version(dst: &mut BytesMut, version: Version) {
    let str = match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    };
    dst.put_slice(str.as_bytes());
}

/// Writes every header followed by the blank line that ends the header block.
pub(crate) fn write_headers(dst: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers {
        put_canonical_name(dst, name.as_str());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

pub(crate) fn write_body(dst: &mut BytesMut, body: &Body, options: &DumpOptions) {
    if body.is_empty() {
        return;
    }

    if options.max_body_len.is_some_and(|max| body.len() > max) {
        return;
    }

    if body.is_binary() {
        hex_dump(dst, body.as_bytes());
    } else {
        dst.put_slice(body.as_bytes());
    }
}

/// `http` stores header names lowercased; render them as `Content-Type`.
fn put_canonical_name(dst: &mut BytesMut, name: &str) {
    let mut upper = true;
    for b in name.bytes() {
        dst.put_u8(if upper { b.to_ascii_uppercase() } else { b });
        upper = b == b'-';
    }
}

/// Writes `bytes` as offset, sixteen hex bytes and their printable characters per line.
pub fn hex_dump(dst: &mut BytesMut, bytes: &[u8]) {
    dst.reserve(bytes.len().div_ceil(DUMP_WIDTH) * 79);
    for (line, chunk) in bytes.chunks(DUMP_WIDTH).enumerate() {
        let offset = line * DUMP_WIDTH;
        for shift in (0..8).rev() {
            dst.put_u8(HEX[(offset >> (shift * 4)) & 0xf]);
        }
        dst.put_slice(b"  ");

        for i in 0..DUMP_WIDTH {
            match chunk.get(i) {
                Some(&b) => {
                    dst.put_u8(HEX[usize::from(b >> 4)]);
                    dst.put_u8(HEX[usize::from(b & 0xf)]);
                    dst.put_u8(b' ');
                }
                None => dst.put_slice(b"   "),
            }
            if i == DUMP_WIDTH / 2 - 1 {
                dst.put_u8(b' ');
            }
        }

        dst.put_slice(b" |");
        for &b in chunk {
            dst.put_u8(if (0x20..0x7f).contains(&b) { b } else { b'.' });
        }
        dst.put_slice(b"|\n");
    }
}
