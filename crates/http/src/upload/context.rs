use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::protocol::{UploadError, UploadOutcome};
use crate::upload::naming::{reserve, sanitize_filename};
use crate::upload::ScratchFiles;

/// Upload persistence state of one connection.
///
/// The connection forwards the decoder's upload events to [`begin`](Self::begin),
/// [`write`](Self::write) and [`finish`](Self::finish), then reconciles the decoder's verdict
/// with [`settle`](Self::settle) once the request is complete. Persistence failures are
/// recorded rather than returned: they never end the connection but turn into the request's
/// [`UploadOutcome::Failed`].
///
/// A file that was not completely written is deleted. Completed uploads and files registered
/// in [`scratch_files`](Self::scratch_files) are deleted by [`close`](Self::close) unless
/// `keep_files` is set.
#[derive(Debug)]
pub struct UploadContext {
    upload_dir: PathBuf,
    keep_files: bool,

    // per request
    original_name: Option<String>,
    final_path: Option<PathBuf>,
    output: Option<File>,
    is_video: bool,
    complete: bool,
    failure: Option<UploadError>,

    // per connection
    last_upload: Option<PathBuf>,
    scratch: ScratchFiles,
    closed: bool,
}

impl UploadContext {
    pub fn new(upload_dir: impl Into<PathBuf>, keep_files: bool) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            keep_files,
            original_name: None,
            final_path: None,
            output: None,
            is_video: false,
            complete: false,
            failure: None,
            last_upload: None,
            scratch: ScratchFiles::default(),
            closed: false,
        }
    }

    /// The current body carries a `video_file` upload.
    pub fn is_video(&self) -> bool {
        self.is_video
    }

    /// Client-supplied name of the upload in progress.
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Collision-free destination of the upload in progress.
    pub fn final_path(&self) -> Option<&Path> {
        self.final_path.as_deref()
    }

    /// The most recent upload completed on this connection.
    pub fn last_upload(&self) -> Option<&Path> {
        self.last_upload.as_deref()
    }

    /// Handle on the files deleted together with this connection's uploads.
    pub fn scratch_files(&self) -> ScratchFiles {
        self.scratch.clone()
    }

    /// Opens the destination of a new upload.
    pub async fn begin(&mut self, client_name: &str) {
        self.is_video = true;
        self.original_name = Some(client_name.to_string());

        if let Err(e) = self.open(client_name).await {
            warn!(filename = client_name, cause = %e, "can't store upload");
            self.failure = Some(e);
        }
    }

    async fn open(&mut self, client_name: &str) -> Result<(), UploadError> {
        let name = sanitize_filename(client_name)?;
        let (path, file) = reserve(&self.upload_dir.join(name)).await?;

        debug!(path = %path.display(), "upload started");
        self.final_path = Some(path);
        self.output = Some(file);
        Ok(())
    }

    /// Appends payload bytes to the open upload; a no-op after a failure.
    pub async fn write(&mut self, chunk: &[u8]) {
        let Some(file) = self.output.as_mut() else {
            return;
        };

        if let Err(e) = file.write_all(chunk).await {
            warn!(cause = %e, "can't write upload");
            self.output.take();
            self.failure = Some(e.into());
        }
    }

    /// Flushes and closes the upload once its closing delimiter was seen.
    pub async fn finish(&mut self) {
        let Some(mut file) = self.output.take() else {
            return;
        };

        match file.flush().await {
            Ok(()) => {
                self.complete = true;
                if let Some(path) = &self.final_path {
                    info!(path = %path.display(), "upload saved");
                    self.scratch.register(path.clone());
                }
            }
            Err(e) => {
                warn!(cause = %e, "can't flush upload");
                self.failure = Some(e.into());
            }
        }
    }

    /// Combines the decoder's `outcome` for the finished request with what was persisted, and
    /// resets the per-request state.
    pub async fn settle(&mut self, outcome: UploadOutcome<String>) -> UploadOutcome<PathBuf> {
        let result = match (outcome, self.failure.take()) {
            (UploadOutcome::None, _) => UploadOutcome::None,
            (_, Some(e)) | (UploadOutcome::Failed(e), None) => UploadOutcome::Failed(e),
            (UploadOutcome::Saved(_), None) => match self.final_path.take() {
                Some(path) if self.complete => {
                    self.last_upload = Some(path.clone());
                    UploadOutcome::Saved(path)
                }
                other => {
                    self.final_path = other;
                    UploadOutcome::Failed(UploadError::Unterminated)
                }
            },
        };

        self.discard_partial().await;
        self.original_name = None;
        self.final_path = None;
        self.is_video = false;
        self.complete = false;
        result
    }

    /// Releases everything held for the connection.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.discard_partial().await;

        if self.keep_files {
            return;
        }
        for path in self.scratch.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed scratch file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), cause = %e, "can't remove scratch file"),
            }
        }
    }

    /// Deletes the destination of an upload that did not complete.
    async fn discard_partial(&mut self) {
        self.output.take();
        if self.complete {
            return;
        }
        if let Some(path) = self.final_path.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(path = %path.display(), "removed incomplete upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), cause = %e, "can't remove incomplete upload"),
            }
        }
    }
}

impl Drop for UploadContext {
    /// Cleanup for connections whose task is dropped before [`close`](Self::close) ran.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.output.take();

        let partial = if self.complete { None } else { self.final_path.take() };
        let scratch = if self.keep_files { Vec::new() } else { self.scratch.take() };
        for path in partial.into_iter().chain(scratch) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed file of dropped connection"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), cause = %e, "can't remove file of dropped connection"),
            }
        }
    }
}
