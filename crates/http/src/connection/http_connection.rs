use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::{error, info, warn};

use crate::codec::{RequestDecoder, RequestEvent};
use crate::connection::ResponseWriter;
use crate::handler::Handler;
use crate::protocol::{HttpError, Request, RequestMessage, Response, UploadOutcome};
use crate::upload::UploadContext;

const READ_BUFFER_SIZE: usize = 8 * 1024;
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Settings shared by all connections of a server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Directory uploads are written to.
    pub upload_dir: PathBuf,
    /// Keep uploads and derived files after the connection closed.
    pub keep_files: bool,
    /// Longest wait for the next bytes from the peer.
    pub keepalive_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { upload_dir: PathBuf::from("."), keep_files: false, keepalive_timeout: Duration::from_secs(60) }
    }
}

/// An HTTP connection that processes its requests strictly in order.
///
/// `HttpConnection` handles the full lifecycle of one connection:
/// - Reading and decoding requests with a [`RequestDecoder`]
/// - Persisting multipart uploads while the body is still arriving
/// - Dispatching each complete request to the [`Handler`] and writing its response
/// - Closing on protocol errors, on `Connection: close`, on a non keep-alive request, on
///   disconnect and on idle timeout
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: ResponseWriter<W>,
    uploads: UploadContext,
    keepalive_timeout: Duration,
}

impl<R, W> fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("decoder", self.framed_read.decoder())
            .field("uploads", &self.uploads)
            .field("keepalive_timeout", &self.keepalive_timeout)
            .finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: &ConnectionConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            writer: ResponseWriter::with_capacity(writer, WRITE_BUFFER_SIZE),
            uploads: UploadContext::new(config.upload_dir.clone(), config.keep_files),
            keepalive_timeout: config.keepalive_timeout,
        }
    }

    /// Serves requests until the connection ends, then releases its files.
    ///
    /// Protocol errors close the connection without a response and are returned.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        let result = self.do_process(handler.as_ref()).await;
        self.uploads.close().await;
        result
    }

    async fn do_process<H>(&mut self, handler: &H) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            let Ok(next) = tokio::time::timeout(self.keepalive_timeout, self.framed_read.next()).await else {
                info!(timeout_ms = self.keepalive_timeout.as_millis() as u64, "connection idle, closing");
                self.log_interrupted_upload("timed out");
                return Ok(());
            };

            match next {
                Some(Ok(RequestEvent::UploadStarted { filename })) => self.uploads.begin(&filename).await,
                Some(Ok(RequestEvent::UploadChunk(bytes))) => self.uploads.write(&bytes).await,
                Some(Ok(RequestEvent::UploadFinished)) => self.uploads.finish().await,

                Some(Ok(RequestEvent::Request { message, upload })) => {
                    if !self.dispatch(message, upload, handler).await? {
                        return Ok(());
                    }
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request, closing connection");
                    self.log_interrupted_upload("request error");
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    self.log_interrupted_upload("peer closed");
                    return Ok(());
                }
            }
        }
    }

    fn log_interrupted_upload(&self, reason: &str) {
        if self.uploads.is_video() {
            warn!(
                reason,
                filename = self.uploads.original_name().unwrap_or_default(),
                path = ?self.uploads.final_path(),
                "connection ended mid-upload, discarding it"
            );
        }
    }

    /// Answers one request and returns whether the connection stays open.
    async fn dispatch<H>(&mut self, message: RequestMessage, upload: UploadOutcome<String>, handler: &H) -> Result<bool, HttpError>
    where
        H: Handler,
    {
        let version = message.version();
        let request_keep_alive = message.keep_alive();

        let upload = self.uploads.settle(upload).await;
        if let Some(e) = upload.error() {
            if !e.is_no_upload() {
                warn!(cause = %e, "upload failed");
            }
        }
        let request = Request::new(message, upload, self.uploads.last_upload().map(Path::to_path_buf))
            .with_scratch_files(self.uploads.scratch_files());

        let mut response = match handler.call(request).await {
            Ok(response) => response,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle response error");
                Response::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        let keep_alive = request_keep_alive && !response.is_closing();
        response.prepare(version, keep_alive);

        self.writer.send(response).await?;
        Ok(keep_alive)
    }
}
