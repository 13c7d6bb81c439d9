//! Serialization of response heads.
//!
//! The body is not encoded here: in-memory bodies are appended by the
//! [`ResponseWriter`](crate::connection::ResponseWriter) and file bodies are streamed by it.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::date::DateService;
use crate::protocol::{ResponseMessage, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 512;

const SERVER: &str = concat!("sharpd-http/", env!("CARGO_PKG_VERSION"));

/// Everything the head of one response needs.
#[derive(Debug)]
pub struct ResponseHead<'a> {
    message: &'a ResponseMessage,
    content_length: u64,
    attachment: Option<&'a str>,
}

impl<'a> ResponseHead<'a> {
    pub fn new(message: &'a ResponseMessage, content_length: u64, attachment: Option<&'a str>) -> Self {
        Self { message, content_length, attachment }
    }
}

#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<ResponseHead<'_>> for ResponseEncoder {
    type Error = SendError;

    /// Writes the status line, the fixed header set and the blank line.
    ///
    /// `Content-Length` is always present, `Content-Type` only when the message has one.
    fn encode(&mut self, head: ResponseHead<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let message = head.message;
        dst.reserve(INIT_HEADER_SIZE);

        write!(FastWrite(dst), "{} {} {}\r\n", message.version(), message.status().as_str(), message.reason())?;
        dst.put_slice(b"Access-Control-Allow-Origin: *\r\n");

        if let Some(filename) = head.attachment {
            dst.put_slice(b"Content-Disposition: attachment; filename=\"");
            for b in filename.bytes() {
                if b == b'"' || b == b'\\' {
                    dst.put_u8(b'\\');
                }
                dst.put_u8(b);
            }
            dst.put_slice(b"\"\r\n");
        }

        write!(FastWrite(dst), "Server: {SERVER}\r\n")?;
        let connection: &[u8] = if message.keep_alive() { b"Connection: keep-alive\r\n" } else { b"Connection: close\r\n" };
        dst.put_slice(connection);
        write!(FastWrite(dst), "Content-Length: {}\r\n", head.content_length)?;

        if let Some(content_type) = message.content_type() {
            write!(FastWrite(dst), "Content-Type: {content_type}\r\n")?;
        }

        DateService::global().with_http_date(|date| {
            dst.put_slice(b"Date: ");
            dst.put_slice(date);
            dst.put_slice(b"\r\n");
        });

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// This is an optimization to avoid unnecessary bounds checking when writing
/// to the bytes buffer, since we've already reserved enough space.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
