//! HTTP connection handling module
//!
//! # Components
//!
//! - [`HttpConnection`]: drives one connection:
//!   - decodes requests and persists uploads while their bodies arrive
//!   - dispatches complete requests to the handler, one at a time
//!   - supports keep-alive, with an idle timeout between reads
//!   - releases upload and scratch files on every exit path
//! - [`ResponseWriter`]: writes response heads and bodies, streaming files in bounded chunks
//!   and bounding retries when the transport accepts nothing

mod http_connection;
mod response_writer;

pub use http_connection::{ConnectionConfig, HttpConnection};
pub use response_writer::{FILE_CHUNK_SIZE, MAX_ZERO_WRITES, ResponseWriter, ZERO_WRITE_BACKOFF};
