//! HTTP codec module for decoding requests and encoding response heads
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestDecoder`]: the connection state machine, emitting [`RequestEvent`]s
//!   - request line and header line parsing in `head`
//!   - multipart bodies are handed to a [`PartScanner`](crate::multipart::PartScanner)
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: encodes a [`ResponseHead`]; bodies are written by the
//!     [`ResponseWriter`](crate::connection::ResponseWriter)
//!
//! # Limits
//!
//! Every limit below is a protocol error when exceeded, and the connection is closed without
//! a response.

mod head;
mod request_decoder;
mod response_encoder;

pub use request_decoder::{ConnectionState, ReadMode, RequestDecoder, RequestEvent};
pub use response_encoder::{ResponseEncoder, ResponseHead};

/// Maximum size of one request or header line, terminator included.
pub const MAX_LINE_BYTES: usize = 4096;

/// Maximum length of the request method token.
pub const MAX_METHOD_LENGTH: usize = 32;

/// Maximum length of the request path, query included.
pub const MAX_PATH_LENGTH: usize = 256;

/// Maximum length of the `Content-Type` and `Host` values.
pub const MAX_HEADER_VALUE_LENGTH: usize = 256;

/// Maximum declared length of a body that is kept in memory.
///
/// Multipart bodies are streamed and not subject to this limit.
pub const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;
