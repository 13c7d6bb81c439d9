//! HTTP request decoder module
//!
//! [`RequestDecoder`] rebuilds requests incrementally from whatever the transport delivers.
//! The protocol state machine lives in [`RequestDecoder::feed`], which consumes one unit at a
//! time (a complete line while the head is parsed, a raw byte run while the body is) and never
//! performs I/O. Its results are queued as [`RequestEvent`]s.
//!
//! The [`Decoder`] implementation cuts the transport buffer into those units according to
//! [`RequestDecoder::read_mode`], so the decoder can be driven by a
//! [`FramedRead`](tokio_util::codec::FramedRead).
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use sharpd_http::codec::{RequestDecoder, RequestEvent};
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET /ping HTTP/1.1\r\n\r\n"[..]);
//!
//! match decoder.decode(&mut buffer).unwrap() {
//!     Some(RequestEvent::Request { message, .. }) => assert_eq!(message.path(), "/ping"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::head::{apply_header, parse_request_line};
use crate::codec::{MAX_BODY_BYTES, MAX_LINE_BYTES};
use crate::ensure;
use crate::multipart::{PartScanner, ScanEvent, boundary_from_content_type};
use crate::protocol::{BodyBuf, ParseError, RequestMessage, UploadError, UploadOutcome};
use crate::utils::strip_line_terminator;

/// Position of the decoder inside the current request, named after what it handles next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing received on the connection yet; the next line is the first request line.
    Begin,
    /// The next line is a request line of a keep-alive follow-up request.
    FirstLine,
    /// The next lines are headers, until a bare line terminator.
    Head,
    /// The head is complete; the body framing is being decided.
    HeadEnd,
    /// The next bytes are body bytes.
    Body,
    /// The last request was not keep-alive; further input is ignored.
    End,
}

/// The kind of unit [`RequestDecoder::feed`] expects next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// One line including its `\n`, at most [`MAX_LINE_BYTES`].
    Line,
    /// Up to this many body bytes.
    Raw(u64),
    /// The connection is done reading.
    Closed,
}

#[derive(Debug)]
pub enum RequestEvent {
    /// The `video_file` payload starts; its bytes follow as `UploadChunk`s.
    UploadStarted { filename: String },
    UploadChunk(Bytes),
    /// The payload's closing delimiter was seen.
    UploadFinished,
    /// A complete request. Multipart bodies report their upload outcome with the
    /// client-supplied filename; their bytes were already delivered as upload events.
    Request { message: RequestMessage, upload: UploadOutcome<String> },
}

impl From<ScanEvent> for RequestEvent {
    fn from(event: ScanEvent) -> Self {
        match event {
            ScanEvent::Started(filename) => RequestEvent::UploadStarted { filename },
            ScanEvent::Data(bytes) => RequestEvent::UploadChunk(bytes),
            ScanEvent::Finished => RequestEvent::UploadFinished,
        }
    }
}

#[derive(Debug)]
enum BodyKind {
    /// Kept in memory as the request's literal body.
    Literal,
    Multipart(PartScanner),
    /// Multipart body that cannot be scanned; only counted.
    Rejected(UploadError),
}

/// Incremental request decoder for one connection.
#[derive(Debug)]
pub struct RequestDecoder {
    state: ConnectionState,
    message: RequestMessage,
    body: BodyKind,
    events: VecDeque<RequestEvent>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn read_mode(&self) -> ReadMode {
        match self.state {
            ConnectionState::Begin | ConnectionState::FirstLine | ConnectionState::Head => ReadMode::Line,
            ConnectionState::HeadEnd | ConnectionState::Body => ReadMode::Raw(self.message.body().remaining()),
            ConnectionState::End => ReadMode::Closed,
        }
    }

    /// Takes the oldest queued event.
    pub fn next_event(&mut self) -> Option<RequestEvent> {
        self.events.pop_front()
    }

    /// Consumes one unit of input and returns how many of its bytes were used.
    ///
    /// In the line states `unit` must be one complete line including its terminator; in the
    /// body state it may be any run of bytes, of which at most the outstanding body length is
    /// consumed. Input after a non keep-alive request is ignored.
    pub fn feed(&mut self, unit: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ConnectionState::Begin | ConnectionState::FirstLine => {
                let line = strip_line_terminator(unit).ok_or(ParseError::UnterminatedLine)?;
                self.message = parse_request_line(line)?;
                trace!(method = %self.message.method(), path = self.message.path(), "parsed request line");
                self.state = ConnectionState::Head;
                Ok(unit.len())
            }

            ConnectionState::Head => {
                let line = strip_line_terminator(unit).ok_or(ParseError::UnterminatedLine)?;
                if line.is_empty() {
                    self.state = ConnectionState::HeadEnd;
                    self.head_end()?;
                } else {
                    apply_header(&mut self.message, line)?;
                }
                Ok(unit.len())
            }

            ConnectionState::HeadEnd | ConnectionState::Body => {
                let remaining = self.message.body().remaining();
                let run = &unit[..unit.len().min(usize::try_from(remaining).unwrap_or(usize::MAX))];
                self.body_run(run);
                if self.message.body().is_complete() {
                    self.complete();
                }
                Ok(run.len())
            }

            ConnectionState::End => Ok(unit.len()),
        }
    }

    /// Decides the body framing once the blank line after the headers arrived.
    fn head_end(&mut self) -> Result<(), ParseError> {
        let content_length = self.message.content_length();

        self.body = match self.message.content_type().map(boundary_from_content_type) {
            Some(Ok(Some(boundary))) => BodyKind::Multipart(PartScanner::new(&boundary)),
            Some(Err(e)) => BodyKind::Rejected(e),
            Some(Ok(None)) | None => {
                ensure!(content_length <= MAX_BODY_BYTES, ParseError::too_large_body(content_length, MAX_BODY_BYTES));
                BodyKind::Literal
            }
        };
        self.message.set_body(BodyBuf::with_declared(content_length));

        if content_length == 0 {
            self.complete();
        } else {
            self.state = ConnectionState::Body;
        }
        Ok(())
    }

    fn body_run(&mut self, run: &[u8]) {
        let events = &mut self.events;
        match &mut self.body {
            BodyKind::Literal => {
                self.message.body_mut().append(run);
                return;
            }
            BodyKind::Multipart(scanner) => scanner.feed(run, |event| events.push_back(event.into())),
            BodyKind::Rejected(_) => {}
        }
        self.message.body_mut().record(run.len());
    }

    /// Emits the finished request and prepares for the next one.
    fn complete(&mut self) {
        let upload = match std::mem::replace(&mut self.body, BodyKind::Literal) {
            BodyKind::Literal => UploadOutcome::None,
            BodyKind::Multipart(scanner) => scanner.finish(),
            BodyKind::Rejected(e) => UploadOutcome::Failed(e),
        };

        let message = std::mem::take(&mut self.message);
        self.state = if message.keep_alive() { ConnectionState::FirstLine } else { ConnectionState::End };
        debug!(method = %message.method(), path = message.path(), keep_alive = message.keep_alive(), "request complete");
        self.events.push_back(RequestEvent::Request { message, upload });
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self {
            state: ConnectionState::Begin,
            message: RequestMessage::default(),
            body: BodyKind::Literal,
            events: VecDeque::new(),
        }
    }
}

impl Decoder for RequestDecoder {
    type Item = RequestEvent;
    type Error = ParseError;

    /// Feeds complete units from `src` until an event is ready or more input is needed.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))`: the next event in arrival order
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: a protocol error; the connection must be closed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }
            if src.is_empty() {
                return Ok(None);
            }

            match self.read_mode() {
                ReadMode::Line => {
                    let window = &src[..src.len().min(MAX_LINE_BYTES)];
                    let Some(newline) = window.iter().position(|b| *b == b'\n') else {
                        ensure!(window.len() < MAX_LINE_BYTES, ParseError::UnterminatedLine);
                        return Ok(None);
                    };
                    let line = src.split_to(newline + 1);
                    self.feed(&line)?;
                }
                ReadMode::Raw(remaining) => {
                    let len = src.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
                    let run = src.split_to(len);
                    self.feed(&run)?;
                }
                ReadMode::Closed => {
                    trace!(ignored = src.len(), "input after the last request");
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(event) => Ok(Some(event)),
            None if src.is_empty() => Ok(None),
            // a line cut off by the end of the stream
            None => Err(ParseError::UnterminatedLine),
        }
    }
}
