//! Core HTTP protocol types.
//!
//! This module holds the passive data of the engine: the message model shared by requests
//! and responses, the completed [`Request`] handed to handlers, the [`Response`] they build,
//! and the error taxonomy.
//!
//! # Components
//!
//! - **Message Model** (`message`): [`HttpMessage`] with a [`RequestLine`] or [`StatusLine`]
//!   start line, plus [`BodyBuf`] tracking declared against accumulated body length
//! - **Requests** (`request`): [`Request`] and the [`UploadOutcome`] of multipart bodies
//! - **Responses** (`response`): [`Response`] with in-memory or file-backed [`ResponseBody`]
//! - **Errors** (`error`):
//!   - [`ParseError`]: protocol errors, fatal for the connection
//!   - [`SendError`]: response sending errors
//!   - [`UploadError`]: upload extraction and persistence errors, answered with 404
//!   - [`HttpError`]: top-level error

mod message;
pub use message::BodyBuf;
pub use message::HttpMessage;
pub use message::ProtocolVersion;
pub use message::RequestLine;
pub use message::RequestMessage;
pub use message::ResponseMessage;
pub use message::StatusLine;

mod request;
pub use request::Request;
pub use request::UploadOutcome;

mod response;
pub use response::Response;
pub use response::ResponseBody;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::UploadError;
