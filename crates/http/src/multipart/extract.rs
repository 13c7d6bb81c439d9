use std::ops::Range;

use crate::multipart::boundary::delimiter;
use crate::multipart::part_head::upload_filename;
use crate::protocol::UploadError;
use crate::utils::{find_blank_line_end, find_bytes, strip_line_terminator};

/// The upload found in a fully accumulated multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub filename: String,
    /// Byte range of the payload inside the body it was extracted from.
    pub payload: Range<usize>,
}

/// Locates the `video_file` part of a complete `multipart/form-data` body.
///
/// The payload starts right after the part's blank line and ends right before the next
/// `--<boundary>`, minus the line terminator preceding it. Payload bytes are never inspected.
pub fn extract(body: &[u8], boundary: &str) -> Result<Extracted, UploadError> {
    let delimiter = delimiter(boundary);
    let mut offset = 0;

    while let Some(at) = find_bytes(&body[offset..], &delimiter) {
        let part_start = offset + at + delimiter.len();
        if body[part_start..].starts_with(b"--") {
            // closing delimiter
            break;
        }

        let Some(head_len) = find_blank_line_end(&body[part_start..]) else {
            break;
        };
        let payload_start = part_start + head_len;

        match upload_filename(&body[part_start..payload_start])? {
            Some(filename) => {
                let payload_len = find_bytes(&body[payload_start..], &delimiter).ok_or(UploadError::Unterminated)?;
                let payload = &body[payload_start..payload_start + payload_len];
                let payload_len = strip_line_terminator(payload).map_or(payload.len(), <[u8]>::len);
                return Ok(Extracted { filename, payload: payload_start..payload_start + payload_len });
            }
            None => offset = payload_start,
        }
    }

    Err(UploadError::NoUploadFound)
}
