use mime::Mime;

use crate::protocol::UploadError;

/// Returns the boundary token when `content_type` is `multipart/form-data`.
///
/// - `Ok(None)`: not multipart form data (or not a parsable media type)
/// - `Ok(Some(boundary))`: multipart form data with its `boundary=` parameter
/// - `Err(MissingBoundary)`: multipart form data without a usable boundary
pub fn boundary_from_content_type(content_type: &str) -> Result<Option<String>, UploadError> {
    let Ok(mime) = content_type.parse::<Mime>() else {
        return Ok(None);
    };

    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return Ok(None);
    }

    match mime.get_param(mime::BOUNDARY) {
        Some(boundary) if !boundary.as_str().is_empty() => Ok(Some(boundary.as_str().to_string())),
        _ => Err(UploadError::MissingBoundary),
    }
}

/// The delimiter line prefix `--<boundary>`.
pub(crate) fn delimiter(boundary: &str) -> Vec<u8> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary.as_bytes());
    delimiter
}
