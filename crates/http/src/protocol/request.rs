//! The completed request handed to a [`Handler`](crate::handler::Handler).

use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::Method;

use crate::protocol::{RequestMessage, UploadError};
use crate::upload::ScratchFiles;

/// Result of recognizing a `multipart/form-data` upload in a request body.
///
/// The decoder reports `Saved` with the client-supplied filename; after persistence the
/// connection reports `Saved` with the path the payload was written to.
#[derive(Debug)]
pub enum UploadOutcome<T> {
    /// The body is not multipart form data.
    None,
    /// The `video_file` payload was fully delimited.
    Saved(T),
    /// The body was multipart but no upload could be extracted or persisted.
    Failed(UploadError),
}

impl<T> UploadOutcome<T> {
    pub fn saved(&self) -> Option<&T> {
        match self {
            UploadOutcome::Saved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&UploadError> {
        match self {
            UploadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, UploadOutcome::None)
    }
}

/// A reconstructed request plus the connection-scoped upload state.
#[derive(Debug)]
pub struct Request {
    message: RequestMessage,
    upload: UploadOutcome<PathBuf>,
    latest_upload: Option<PathBuf>,
    scratch: ScratchFiles,
}

impl Request {
    pub fn new(message: RequestMessage, upload: UploadOutcome<PathBuf>, latest_upload: Option<PathBuf>) -> Self {
        Self { message, upload, latest_upload, scratch: ScratchFiles::default() }
    }

    /// Attaches the connection's scratch registry.
    pub fn with_scratch_files(mut self, scratch: ScratchFiles) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn message(&self) -> &RequestMessage {
        &self.message
    }

    pub fn method(&self) -> &Method {
        self.message.method()
    }

    /// Request path without any query string.
    pub fn path(&self) -> &str {
        let path = self.message.path();
        path.split_once('?').map_or(path, |(path, _query)| path)
    }

    /// The upload carried by this request's own body.
    pub fn upload(&self) -> &UploadOutcome<PathBuf> {
        &self.upload
    }

    /// The upload of this request, or else the last one persisted earlier on this connection.
    pub fn latest_upload(&self) -> Option<&Path> {
        self.upload.saved().or(self.latest_upload.as_ref()).map(PathBuf::as_path)
    }

    /// Files registered here are deleted when the connection closes.
    pub fn scratch(&self) -> &ScratchFiles {
        &self.scratch
    }

    /// The literal body; empty for multipart bodies, which are streamed to disk.
    pub fn body_bytes(self) -> Bytes {
        self.message.into_body().into_bytes()
    }
}
