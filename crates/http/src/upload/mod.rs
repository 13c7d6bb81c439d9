//! Persistence of uploaded payloads.
//!
//! - [`naming`]: collision-free destination names and client filename sanitization
//! - [`UploadContext`]: the per-connection owner of upload files
//! - [`ScratchFiles`]: files deleted together with the connection's uploads

pub mod naming;

mod context;
mod scratch;
pub use context::UploadContext;
pub use naming::{reserve, resolve_collision, resolve_collision_with, sanitize_filename, transcode_target};
pub use scratch::ScratchFiles;
