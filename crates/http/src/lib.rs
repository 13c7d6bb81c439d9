//! An incremental HTTP/1.1 request engine for video upload services
//!
//! This crate rebuilds requests from a transport that delivers bytes in arbitrary chunks,
//! persists `multipart/form-data` video uploads while their bodies are still arriving, and
//! serves responses, including files, back over the same keep-alive connection.
//!
//! # Features
//!
//! - Incremental request decoding that never blocks and never performs I/O
//! - Streaming extraction of the `video_file` part of multipart bodies
//! - Collision-free upload names, and deletion of incomplete uploads
//! - Keep-alive connections with an idle timeout
//! - File bodies streamed in bounded chunks, with bounded retries on a stalled transport
//! - Clean error handling
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use sharpd_http::connection::{ConnectionConfig, HttpConnection};
//! use sharpd_http::handler::make_handler;
//! use sharpd_http::protocol::{Request, Response};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!     let config = ConnectionConfig::default();
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = tcp_listener.accept().await.unwrap();
//!         let handler = handler.clone();
//!         let config = config.clone();
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer, &config);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!("service has error, cause {}, connection will be closed", e);
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request) -> Result<Response, Box<dyn Error + Send + Sync>> {
//!     let text = match request.upload().saved() {
//!         Some(path) => format!("stored {}", path.display()),
//!         None => "hello world".to_string(),
//!     };
//!     Ok(Response::with_body(StatusCode::OK, "text/plain", text))
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: Core connection handling and lifecycle management
//! - [`codec`]: The request state machine and response head encoding
//! - [`multipart`]: Upload extraction from multipart bodies
//! - [`upload`]: Upload naming and per-connection file ownership
//! - [`protocol`]: Message model, requests, responses and errors
//! - [`handler`]: Request handler traits and utilities
//! - [`date`]: The cached `Date` header value

pub mod codec;
pub mod connection;
pub mod date;
pub mod handler;
pub mod multipart;
pub mod protocol;
pub mod upload;

mod utils;
pub(crate) use utils::ensure;
