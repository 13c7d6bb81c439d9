use std::io;
use thiserror::Error;

/// Top-level error returned by [`HttpConnection::process`](crate::connection::HttpConnection::process).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Protocol errors raised while reconstructing a request.
///
/// Every variant is fatal for the connection: it is closed without a response.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line is not terminated by a line break")]
    UnterminatedLine,

    #[error("invalid request line: {reason}")]
    InvalidRequestLine { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("request path too long, current: {current_size} exceed the limit {max_size}")]
    TooLongPath { current_size: usize, max_size: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_request_line<S: ToString>(str: S) -> Self {
        Self::InvalidRequestLine { reason: str.to_string() }
    }

    pub fn too_long_path(current_size: usize, max_size: usize) -> Self {
        Self::TooLongPath { current_size, max_size }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: u64, max_size: u64) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("transport accepted no bytes after {attempts} attempts")]
    Stalled { attempts: u32 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

/// Failures of the upload path: multipart extraction, naming and persistence.
///
/// These never close the connection; the route layer answers them with a 404.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no `video_file` part with a filename attribute")]
    NoUploadFound,

    #[error("multipart content type without a boundary parameter")]
    MissingBoundary,

    #[error("upload filename too long, current: {current_size} exceed the limit {max_size}")]
    NameTooLong { current_size: usize, max_size: usize },

    #[error("no free filename for {candidate} after {attempts} attempts")]
    NameExhausted { candidate: String, attempts: usize },

    #[error("invalid upload filename: {reason}")]
    InvalidFilename { reason: String },

    #[error("multipart part headers exceed the limit {max_size}")]
    PartHeadTooLarge { max_size: usize },

    #[error("upload payload is not terminated by the boundary delimiter")]
    Unterminated,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl UploadError {
    pub fn name_too_long(current_size: usize, max_size: usize) -> Self {
        Self::NameTooLong { current_size, max_size }
    }

    pub fn invalid_filename<S: ToString>(str: S) -> Self {
        Self::InvalidFilename { reason: str.to_string() }
    }

    /// Returns true when the body simply carried no upload.
    pub fn is_no_upload(&self) -> bool {
        matches!(self, UploadError::NoUploadFound)
    }
}
