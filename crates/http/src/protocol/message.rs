use std::fmt;

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode};

/// Protocol version carried on the first line, `HTTP/<major>.<minor>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const HTTP_10: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };
    pub const HTTP_11: ProtocolVersion = ProtocolVersion { major: 1, minor: 1 };
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// Start line of a request: method and path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub(crate) method: Method,
    pub(crate) path: String,
}

/// Start line of a response: status code and status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub(crate) status: StatusCode,
    pub(crate) reason: String,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl StatusLine {
    pub fn new(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        Self { status, reason }
    }
}

/// Body bytes together with the declared and accumulated lengths.
///
/// The body is complete only once `accumulated == declared`. Bodies that are streamed
/// elsewhere (multipart uploads) are only counted, not retained.
#[derive(Debug, Clone, Default)]
pub struct BodyBuf {
    data: BytesMut,
    declared: u64,
    accumulated: u64,
}

impl BodyBuf {
    pub fn with_declared(declared: u64) -> Self {
        Self { data: BytesMut::new(), declared, accumulated: 0 }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len() as u64;
        Self { data: BytesMut::from(bytes), declared: len, accumulated: len }
    }

    /// Appends and retains a chunk of the literal body.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.accumulated += chunk.len() as u64;
    }

    /// Counts `len` bytes that were consumed by someone else.
    pub fn record(&mut self, len: usize) {
        self.accumulated += len as u64;
    }

    pub fn declared(&self) -> u64 {
        self.declared
    }

    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.declared.saturating_sub(self.accumulated)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.accumulated == self.declared
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

/// The shape shared by requests and responses.
///
/// `L` is the start line: [`RequestLine`] or [`StatusLine`].
#[derive(Debug, Clone, Default)]
pub struct HttpMessage<L> {
    version: ProtocolVersion,
    line: L,
    host: Option<String>,
    content_length: u64,
    content_type: Option<String>,
    keep_alive: bool,
    body: BodyBuf,
}

pub type RequestMessage = HttpMessage<RequestLine>;
pub type ResponseMessage = HttpMessage<StatusLine>;

impl<L> HttpMessage<L> {
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = Some(host.into());
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn set_content_length(&mut self, content_length: u64) {
        self.content_length = content_length;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    pub fn body(&self) -> &BodyBuf {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut BodyBuf {
        &mut self.body
    }

    pub fn set_body(&mut self, body: BodyBuf) {
        self.body = body;
    }

    pub fn into_body(self) -> BodyBuf {
        self.body
    }
}

impl RequestMessage {
    /// Creates a request message; keep-alive follows the version default.
    pub fn request(method: Method, path: impl Into<String>, version: ProtocolVersion) -> Self {
        Self {
            version,
            line: RequestLine { method, path: path.into() },
            keep_alive: version.minor >= 1,
            ..Default::default()
        }
    }

    pub fn method(&self) -> &Method {
        &self.line.method
    }

    pub fn path(&self) -> &str {
        &self.line.path
    }
}

impl ResponseMessage {
    pub fn response(status: StatusCode) -> Self {
        Self { line: StatusLine::new(status), keep_alive: true, ..Default::default() }
    }

    pub fn status(&self) -> StatusCode {
        self.line.status
    }

    pub fn reason(&self) -> &str {
        &self.line.reason
    }
}
