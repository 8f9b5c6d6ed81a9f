use std::io;
use thiserror::Error;

/// Failure of one attempt to pull the next exchange out of a flow.
///
/// Parse failures are recoverable by resynchronizing the direction they came from,
/// pipe failures describe the state of the underlying byte channel.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("pipe error: {source}")]
    Pipe {
        #[from]
        source: PipeError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: String },

    #[error("too many Host headers")]
    DuplicateHostHeader,

    #[error("malformed status line: {line}")]
    MalformedStatusLine { line: String },

    #[error("malformed status code: {code}")]
    MalformedStatusCode { code: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: &'static str },

    #[error("unexpected end of stream inside header block")]
    IncompleteHeader,

    #[error("unexpected end of stream inside body: {reason}")]
    IncompleteBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn malformed_request_line<S: ToString>(str: S) -> Self {
        Self::MalformedRequestLine { reason: str.to_string() }
    }

    pub fn malformed_status_line(line: &[u8]) -> Self {
        Self::MalformedStatusLine { line: String::from_utf8_lossy(line).into_owned() }
    }

    pub fn malformed_status_code(code: &[u8]) -> Self {
        Self::MalformedStatusCode { code: String::from_utf8_lossy(code).into_owned() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk(reason: &'static str) -> Self {
        Self::InvalidChunk { reason }
    }

    pub fn incomplete_body<S: ToString>(str: S) -> Self {
        Self::IncompleteBody { reason: str.to_string() }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    #[error("pipe closed")]
    Closed,

    #[error("read deadline exceeded")]
    DeadlineExceeded,
}

/// Errors raised while setting up a capture session. These are fatal to the caller.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("invalid filter: {reason}")]
    InvalidFilter { reason: String },

    #[error("failed to install diagnostics: {reason}")]
    Diagnostics { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SetupError {
    pub fn invalid_filter<S: ToString>(str: S) -> Self {
        Self::InvalidFilter { reason: str.to_string() }
    }

    pub fn diagnostics<S: ToString>(str: S) -> Self {
        Self::Diagnostics { reason: str.to_string() }
    }
}
