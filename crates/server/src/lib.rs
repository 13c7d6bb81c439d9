//! A video upload and transcode server built on [`sharpd_http`]
//!
//! Clients upload a video as `multipart/form-data` to `POST /video_sharpness`, either in the
//! same request or in an earlier request on the same keep-alive connection. The server stores
//! the upload under a collision-free name, runs the transcoder over it and returns the result
//! as an MP4 attachment. Uploads and derived files are removed when their connection closes.
//!
//! # Modules
//!
//! - [`config`]: the command line
//! - [`server`]: the acceptor and its round-robin worker pool
//! - [`router`]: the route table and static files
//! - [`transcode`]: the external transcoding step

pub mod config;
pub mod router;
pub mod server;
pub mod transcode;

pub use config::ServerConfig;
pub use router::Routes;
pub use server::{Server, ServerError};
pub use transcode::{Ffmpeg, Transcoder};
