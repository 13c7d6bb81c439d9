//! Responses built by handlers and serialized by the
//! [`ResponseWriter`](crate::connection::ResponseWriter).

use std::io;
use std::path::Path;

use bytes::Bytes;
use http::StatusCode;
use tokio::fs::File;

use crate::protocol::{ProtocolVersion, ResponseMessage};

const HTML_TAG_BEGIN: &str = "<html><body><center><h1>";
const HTML_TAG_END: &str = "</h1></center></body></html>";

#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    Bytes(Bytes),
    /// An opened file streamed in bounded chunks; `attachment` is the advertised filename.
    File { file: File, len: u64, attachment: Option<String> },
}

#[derive(Debug)]
pub struct Response {
    message: ResponseMessage,
    body: ResponseBody,
    closing: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { message: ResponseMessage::response(status), body: ResponseBody::Empty, closing: false }
    }

    pub fn with_body(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.message.set_content_type(content_type);
        response.body = ResponseBody::Bytes(body.into());
        response
    }

    /// A minimal HTML page whose heading is `text`.
    pub fn html(status: StatusCode, text: &str) -> Self {
        Self::with_body(status, mime::TEXT_HTML.as_ref(), format!("{HTML_TAG_BEGIN}{text}{HTML_TAG_END}"))
    }

    pub fn not_found() -> Self {
        Self::html(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn not_implemented() -> Self {
        Self::html(StatusCode::NOT_IMPLEMENTED, "Not Implemented")
    }

    /// Serves the file at `path` inline.
    pub async fn file(path: &Path, content_type: &str) -> io::Result<Self> {
        Self::open(path, content_type, None).await
    }

    /// Serves the file at `path` with `Content-Disposition: attachment`.
    pub async fn attachment(path: &Path, content_type: &str) -> io::Result<Self> {
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned());
        Self::open(path, content_type, name).await
    }

    async fn open(path: &Path, content_type: &str, attachment: Option<String>) -> io::Result<Self> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
        }

        let mut response = Self::new(StatusCode::OK);
        response.message.set_content_type(content_type);
        response.body = ResponseBody::File { file, len: metadata.len(), attachment };
        Ok(response)
    }

    /// Asks the connection to close once this response is written.
    pub fn close(mut self) -> Self {
        self.closing = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.message.status()
    }

    pub fn message(&self) -> &ResponseMessage {
        &self.message
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Aligns version and keep-alive with the request being answered.
    pub(crate) fn prepare(&mut self, version: ProtocolVersion, keep_alive: bool) {
        self.message.set_version(version);
        self.message.set_keep_alive(keep_alive);
    }

    pub(crate) fn into_parts(self) -> (ResponseMessage, ResponseBody) {
        (self.message, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_body_wraps_text() {
        let response = Response::not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.message().content_type(), Some("text/html"));
        match response.body() {
            ResponseBody::Bytes(bytes) => {
                assert_eq!(&bytes[..], b"<html><body><center><h1>Not Found</h1></center></body></html>")
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn attachment_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123").unwrap();

        let response = Response::attachment(&path, "video/mp4").await.unwrap();
        match response.body() {
            ResponseBody::File { len, attachment, .. } => {
                assert_eq!(*len, 4);
                assert_eq!(attachment.as_deref(), Some("clip.mp4"));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Response::file(&dir.path().join("nope.html"), "text/html").await, Err(_)));
    }
}
