//! Decides whether a TCP flow carries HTTP/1.x from its first client payload.

/// Request methods that mark a flow as HTTP.
const METHODS: [&[u8]; 9] = [b"GET", b"POST", b"PUT", b"DELETE", b"HEAD", b"OPTIONS", b"PATCH", b"TRACE", b"CONNECT"];

/// Longest method plus its trailing space.
const SCAN_LEN: usize = 8;

const RESPONSE_PREFIX: &[u8] = b"HTTP/";

/// Returns true if `payload` starts with a known request method followed by a space.
pub fn is_request_start(payload: &[u8]) -> bool {
    let scanned = &payload[..payload.len().min(SCAN_LEN)];
    match scanned.iter().position(|b| *b == b' ') {
        Some(space) if space > 0 => METHODS.contains(&&scanned[..space]),
        _ => false,
    }
}

/// Returns true if `payload` starts like a response status line.
pub fn looks_like_response(payload: &[u8]) -> bool {
    payload.starts_with(RESPONSE_PREFIX)
}

/// Like [`is_request_start`], but also accepts a truncated method at the end of a buffer.
pub(crate) fn may_start_request(bytes: &[u8]) -> bool {
    is_request_start(bytes) || (!bytes.contains(&b' ') && METHODS.iter().any(|method| method.starts_with(bytes)))
}

/// Like [`looks_like_response`], but also accepts a truncated `HTTP/` at the end of a buffer.
pub(crate) fn may_start_response(bytes: &[u8]) -> bool {
    looks_like_response(bytes) || RESPONSE_PREFIX.starts_with(bytes)
}
