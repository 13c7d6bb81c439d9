//! `multipart/form-data` upload extraction.
//!
//! Only one field is of interest: the part named [`UPLOAD_FIELD`] that carries a `filename`
//! attribute. Its payload is the bytes between the part's blank line and the next delimiter,
//! minus the line terminator in front of that delimiter. All other parts are skipped.
//!
//! Two entry points share the same rules:
//!
//! - [`extract`] works on a fully accumulated body and returns the payload range
//! - [`PartScanner`] works on chunks as they arrive and reports [`ScanEvent`]s, so the
//!   payload can be persisted without holding the whole body in memory

mod boundary;
mod extract;
mod part_head;
mod scanner;

pub use boundary::boundary_from_content_type;
pub use extract::{Extracted, extract};
pub use scanner::{MAX_PART_HEAD_BYTES, PartScanner, ScanEvent};

/// Name of the form field holding the uploaded video.
pub const UPLOAD_FIELD: &str = "video_file";

/// Maximum length in bytes of a client-supplied upload filename.
pub const MAX_FILENAME_LENGTH: usize = 255;
