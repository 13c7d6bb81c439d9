use crate::ensure;
use crate::multipart::{MAX_FILENAME_LENGTH, UPLOAD_FIELD};
use crate::protocol::UploadError;

/// Inspects one part's header block and returns the upload filename when the part is the
/// `video_file` field with a `filename` attribute.
///
/// `head` is everything between the delimiter and the blank line, terminators included.
pub(crate) fn upload_filename(head: &[u8]) -> Result<Option<String>, UploadError> {
    for line in head.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|b| *b == b':') else {
            continue;
        };

        if !line[..colon].trim_ascii().eq_ignore_ascii_case(b"content-disposition") {
            continue;
        }

        let params = disposition_params(&line[colon + 1..]);
        let is_upload_field = params.iter().any(|(key, value)| key.eq_ignore_ascii_case(b"name") && value == UPLOAD_FIELD.as_bytes());
        if !is_upload_field {
            return Ok(None);
        }

        return match params.into_iter().find(|(key, _)| key.eq_ignore_ascii_case(b"filename")) {
            Some((_, filename)) => {
                ensure!(filename.len() <= MAX_FILENAME_LENGTH, UploadError::name_too_long(filename.len(), MAX_FILENAME_LENGTH));
                String::from_utf8(filename).map(Some).map_err(|e| UploadError::invalid_filename(format!("filename is not utf-8: {e}")))
            }
            None => Ok(None),
        };
    }

    Ok(None)
}

/// Splits a `Content-Disposition` value into `key=value` parameters.
///
/// Quoted values end at the next unescaped quote; `\"` and `\\` are unescaped.
fn disposition_params(value: &[u8]) -> Vec<(&[u8], Vec<u8>)> {
    let mut params = Vec::new();
    let mut rest = value;

    while !rest.is_empty() {
        let Some(eq) = rest.iter().position(|b| *b == b'=' || *b == b';') else {
            break;
        };
        if rest[eq] == b';' {
            // disposition type such as `form-data`, or a bare flag
            rest = &rest[eq + 1..];
            continue;
        }

        let key = rest[..eq].trim_ascii();
        rest = rest[eq + 1..].trim_ascii_start();

        let mut param = Vec::new();
        if let Some(quoted) = rest.strip_prefix(b"\"") {
            let mut escaped = false;
            let mut end = quoted.len();
            for (i, b) in quoted.iter().enumerate() {
                match (escaped, *b) {
                    (true, b) => {
                        param.push(b);
                        escaped = false;
                    }
                    (false, b'\\') => escaped = true,
                    (false, b'"') => {
                        end = i + 1;
                        break;
                    }
                    (false, b) => param.push(b),
                }
            }
            rest = &quoted[end..];
            rest = match rest.iter().position(|b| *b == b';') {
                Some(semi) => &rest[semi + 1..],
                None => &[],
            };
        } else {
            let end = rest.iter().position(|b| *b == b';').unwrap_or(rest.len());
            param.extend_from_slice(rest[..end].trim_ascii());
            rest = if end < rest.len() { &rest[end + 1..] } else { &[] };
        }

        params.push((key, param));
    }

    params
}
