use std::sync::OnceLock;

use bytes::Bytes;

/// Maximum number of leading bytes inspected when classifying a body.
const BINARY_SAMPLE_SIZE: usize = 100;

/// The collected body of a captured message.
///
/// Whether the body is rendered as text or as a hex dump is decided once,
/// on first use, and cached for the lifetime of the message.
#[derive(Debug, Clone, Default)]
pub struct Body {
    bytes: Bytes,
    binary: OnceLock<bool>,
}

impl Body {
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes, binary: OnceLock::new() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Returns true if the body should be displayed as a hex dump.
    pub fn is_binary(&self) -> bool {
        *self.binary.get_or_init(|| looks_binary(&self.bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(str: &'static str) -> Self {
        Self::new(Bytes::from_static(str.as_bytes()))
    }
}

/// Classifies a byte sequence from its first [`BINARY_SAMPLE_SIZE`] bytes.
///
/// Any control byte other than TAB, LF and CR makes the sample binary; otherwise
/// it is binary when fewer than half of the sampled bytes are printable.
fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_SIZE)];
    let mut text = 0;
    for &b in sample {
        match b {
            b'\t' | b'\n' | b'\r' => text += 1,
            0x00..=0x1f => return true,
            0x7f => {}
            _ => text += 1,
        }
    }
    text * 2 < sample.len()
}
