use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::codec::{ResponseEncoder, ResponseHead};
use crate::ensure;
use crate::protocol::{Response, ResponseBody, SendError};

/// File bodies are read and written in chunks of this size.
pub const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Consecutive writes accepting no bytes before the transport is considered stalled.
pub const MAX_ZERO_WRITES: u32 = 100;

/// Pause after a write that accepted no bytes.
pub const ZERO_WRITE_BACKOFF: Duration = Duration::from_millis(10);

/// Serializes [`Response`]s onto the write half of a connection.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Writes head and body of `response`, then flushes the transport.
    pub async fn send(&mut self, response: Response) -> Result<(), SendError> {
        let (message, body) = response.into_parts();

        match body {
            ResponseBody::Empty => self.encoder.encode(ResponseHead::new(&message, 0, None), &mut self.buffer)?,
            ResponseBody::Bytes(bytes) => {
                self.encoder.encode(ResponseHead::new(&message, bytes.len() as u64, None), &mut self.buffer)?;
                self.buffer.extend_from_slice(&bytes);
            }
            ResponseBody::File { mut file, len, attachment } => {
                self.encoder.encode(ResponseHead::new(&message, len, attachment.as_deref()), &mut self.buffer)?;
                self.write_buffer().await?;

                let mut chunk = vec![0; FILE_CHUNK_SIZE];
                let mut remaining = len;
                while remaining > 0 {
                    let want = usize::try_from(remaining).map_or(FILE_CHUNK_SIZE, |remaining| remaining.min(FILE_CHUNK_SIZE));
                    let read = file.read(&mut chunk[..want]).await?;
                    ensure!(read > 0, SendError::invalid_body(format!("file ended {remaining} bytes early")));
                    write_fully(&mut self.writer, &chunk[..read]).await?;
                    remaining -= read as u64;
                }
                trace!(len, "file body sent");
            }
        }

        self.write_buffer().await?;
        self.writer.flush().await?;
        debug!(status = message.status().as_u16(), keep_alive = message.keep_alive(), "response sent");
        Ok(())
    }

    async fn write_buffer(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        write_fully(&mut self.writer, &self.buffer).await?;
        self.buffer.clear();
        Ok(())
    }
}

/// Writes all of `data`, pausing after each write that accepted nothing.
async fn write_fully<W>(writer: &mut W, mut data: &[u8]) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    let mut zero_writes = 0;
    while !data.is_empty() {
        let written = writer.write(data).await?;
        if written == 0 {
            zero_writes += 1;
            ensure!(zero_writes < MAX_ZERO_WRITES, SendError::Stalled { attempts: zero_writes });
            tokio::time::sleep(ZERO_WRITE_BACKOFF).await;
            continue;
        }
        zero_writes = 0;
        data = &data[written..];
    }
    Ok(())
}
