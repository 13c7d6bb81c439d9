use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sharpd_http::connection::ConnectionConfig;

/// Command line of the `sharpd` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Number of worker threads, defaults to the number of CPUs
    pub thread_count: Option<usize>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory uploads and transcoded files are written to
    #[arg(long, default_value = ".")]
    pub upload_dir: PathBuf,

    /// Directory static files are served from
    #[arg(long, default_value = ".")]
    pub static_root: PathBuf,

    /// Transcoding program
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Idle time in milliseconds before a keep-alive connection is closed
    #[arg(long, default_value_t = 60_000)]
    pub keepalive_timeout_ms: u64,

    /// Keep uploads and transcoded files after their connection closed
    #[arg(long)]
    pub keep_files: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    /// Worker threads to start; never zero.
    pub fn worker_count(&self) -> usize {
        let count = self.thread_count.unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get));
        count.max(1)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            upload_dir: self.upload_dir.clone(),
            keep_files: self.keep_files,
            keepalive_timeout: Duration::from_millis(self.keepalive_timeout_ms),
        }
    }
}
