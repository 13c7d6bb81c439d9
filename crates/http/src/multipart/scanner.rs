//! Incremental multipart scanner.
//!
//! [`PartScanner`] applies the [`extract`](super::extract) rules to a body that arrives in
//! arbitrary chunks, so the upload can be written to disk while it is still being received.
//! Bytes that cannot be attributed yet (a possible partial delimiter, an incomplete part
//! header) stay in the scanner's accumulation buffer; everything else is either emitted as
//! payload or discarded.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::multipart::boundary::delimiter;
use crate::multipart::part_head::upload_filename;
use crate::protocol::{UploadError, UploadOutcome};
use crate::utils::{find_blank_line_end, find_bytes, strip_line_terminator};

/// Maximum bytes buffered while looking for the end of one part's headers.
pub const MAX_PART_HEAD_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The upload part's headers ended; the payload starts with the next `Data`.
    Started(String),
    Data(Bytes),
    /// The delimiter after the payload was seen.
    Finished,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScanState {
    /// Looking for a delimiter, before the first part or inside a part we skip.
    Seeking,
    /// Right after a delimiter: `--` closes the body, anything else opens a part.
    AfterDelimiter,
    PartHead,
    Payload,
    Done,
}

#[derive(Debug)]
pub struct PartScanner {
    delimiter: Vec<u8>,
    buffer: BytesMut,
    state: ScanState,
    filename: Option<String>,
    finished: bool,
    failure: Option<UploadError>,
}

impl PartScanner {
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: delimiter(boundary),
            buffer: BytesMut::new(),
            state: ScanState::Seeking,
            filename: None,
            finished: false,
            failure: None,
        }
    }

    /// Bytes held back because they cannot be attributed yet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds the next body chunk, reporting upload progress to `sink`.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F)
    where
        F: FnMut(ScanEvent),
    {
        if self.state == ScanState::Done {
            return;
        }
        self.buffer.extend_from_slice(chunk);

        loop {
            match self.state {
                ScanState::Seeking => match find_bytes(&self.buffer, &self.delimiter) {
                    Some(at) => {
                        self.buffer.advance(at + self.delimiter.len());
                        self.state = ScanState::AfterDelimiter;
                    }
                    None => {
                        self.retain_tail(self.delimiter.len() - 1);
                        return;
                    }
                },

                ScanState::AfterDelimiter => {
                    if self.buffer.len() < 2 {
                        return;
                    }
                    if self.buffer.starts_with(b"--") {
                        self.done();
                        return;
                    }
                    self.state = ScanState::PartHead;
                }

                ScanState::PartHead => match find_blank_line_end(&self.buffer) {
                    Some(end) => {
                        let head = self.buffer.split_to(end);
                        match upload_filename(&head) {
                            Ok(Some(filename)) => {
                                trace!(filename = %filename, "found upload part");
                                sink(ScanEvent::Started(filename.clone()));
                                self.filename = Some(filename);
                                self.state = ScanState::Payload;
                            }
                            Ok(None) => self.state = ScanState::Seeking,
                            Err(e) => {
                                self.failure = Some(e);
                                self.done();
                                return;
                            }
                        }
                    }
                    None => {
                        if self.buffer.len() > MAX_PART_HEAD_BYTES {
                            self.failure = Some(UploadError::PartHeadTooLarge { max_size: MAX_PART_HEAD_BYTES });
                            self.done();
                        }
                        return;
                    }
                },

                ScanState::Payload => match find_bytes(&self.buffer, &self.delimiter) {
                    Some(at) => {
                        let end = strip_line_terminator(&self.buffer[..at]).map_or(at, <[u8]>::len);
                        let data = self.buffer.split_to(end).freeze();
                        if !data.is_empty() {
                            sink(ScanEvent::Data(data));
                        }
                        sink(ScanEvent::Finished);
                        self.finished = true;
                        self.done();
                        return;
                    }
                    None => {
                        // keep enough to recognize `\r\n--<boundary>` split across chunks
                        let keep = self.delimiter.len() + 1;
                        if self.buffer.len() > keep {
                            let data = self.buffer.split_to(self.buffer.len() - keep).freeze();
                            sink(ScanEvent::Data(data));
                        }
                        return;
                    }
                },

                ScanState::Done => return,
            }
        }
    }

    /// Ends the scan once the whole body was fed.
    pub fn finish(self) -> UploadOutcome<String> {
        if let Some(e) = self.failure {
            return UploadOutcome::Failed(e);
        }

        match (self.filename, self.finished) {
            (Some(filename), true) => UploadOutcome::Saved(filename),
            (Some(_), false) => UploadOutcome::Failed(UploadError::Unterminated),
            (None, _) => UploadOutcome::Failed(UploadError::NoUploadFound),
        }
    }

    fn retain_tail(&mut self, keep: usize) {
        if self.buffer.len() > keep {
            self.buffer.advance(self.buffer.len() - keep);
        }
    }

    fn done(&mut self) {
        self.state = ScanState::Done;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::extract;
    use crate::multipart::test_support::form_body;

    fn scan(body: &[u8], boundary: &str, chunk_size: usize) -> (Vec<ScanEvent>, UploadOutcome<String>) {
        let mut scanner = PartScanner::new(boundary);
        let mut events = Vec::new();
        for chunk in body.chunks(chunk_size) {
            scanner.feed(chunk, |event| events.push(event));
        }
        (events, scanner.finish())
    }

    fn payload_of(events: &[ScanEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Data(data) => Some(&data[..]),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    #[test]
    fn matches_extract_for_every_chunk_size() {
        let payload: &[u8] = b"\r\n\r\nbinary\r\n--xy\r\n\x00\xff\r\n-xyz-not-quite\r\n";
        let body = form_body(
            "xyz",
            &[(r#"name="title""#, b"a title\r\n\r\n"), (r#"name="video_file"; filename="clip.mp4""#, payload)],
        );
        let expected = extract(&body, "xyz").unwrap();

        for chunk_size in 1..=body.len() {
            let (events, outcome) = scan(&body, "xyz", chunk_size);
            assert_eq!(events.first(), Some(&ScanEvent::Started("clip.mp4".to_string())), "chunk size {chunk_size}");
            assert_eq!(events.last(), Some(&ScanEvent::Finished), "chunk size {chunk_size}");
            assert_eq!(payload_of(&events), &body[expected.payload.clone()], "chunk size {chunk_size}");
            assert_eq!(outcome.saved().map(String::as_str), Some("clip.mp4"));
        }
    }

    #[test]
    fn bare_newline_part_heads() {
        let body = b"--xyz\nContent-Disposition: form-data; name=\"video_file\"; filename=\"a.mp4\"\n\n\n\nabc\n--xyz--\n";
        for chunk_size in 1..=body.len() {
            let (events, outcome) = scan(body, "xyz", chunk_size);
            assert_eq!(payload_of(&events), b"\n\nabc", "chunk size {chunk_size}");
            assert_eq!(outcome.saved().map(String::as_str), Some("a.mp4"));
        }
    }

    #[test]
    fn holds_back_only_a_delimiter_tail() {
        let mut scanner = PartScanner::new("xyz");
        let mut data = 0;
        scanner.feed(b"--xyz\r\nContent-Disposition: form-data; name=\"video_file\"; filename=\"a\"\r\n\r\n", |_| {});
        scanner.feed(&[7u8; 1000], |event| {
            if let ScanEvent::Data(bytes) = event {
                data += bytes.len();
            }
        });
        assert_eq!(scanner.buffered(), "--xyz".len() + 1);
        assert_eq!(data + scanner.buffered(), 1000);
    }

    #[test]
    fn no_upload_field() {
        let body = form_body("xyz", &[(r#"name="title""#, b"hello")]);
        let (events, outcome) = scan(&body, "xyz", 3);
        assert!(events.is_empty());
        assert!(matches!(outcome, UploadOutcome::Failed(UploadError::NoUploadFound)));
    }

    #[test]
    fn truncated_payload_is_unterminated() {
        let body = b"--xyz\r\nContent-Disposition: form-data; name=\"video_file\"; filename=\"a.mp4\"\r\n\r\nabcdefghijkl";
        let (events, outcome) = scan(body, "xyz", 5);
        assert_eq!(events[0], ScanEvent::Started("a.mp4".to_string()));
        assert!(!events.contains(&ScanEvent::Finished));
        assert!(matches!(outcome, UploadOutcome::Failed(UploadError::Unterminated)));
    }

    #[test]
    fn oversized_part_head_fails() {
        let mut body = b"--xyz\r\nX-Filler: ".to_vec();
        body.extend(std::iter::repeat_n(b'a', MAX_PART_HEAD_BYTES + 10));
        let (_, outcome) = scan(&body, "xyz", 512);
        assert!(matches!(outcome, UploadOutcome::Failed(UploadError::PartHeadTooLarge { .. })));
    }
}
