//! The external transcoding step.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// Converts the video at `source` into an MP4 file at `target`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns whether `target` was produced.
    async fn transcode(&self, source: &Path, target: &Path) -> bool;
}

/// Runs `<program> -y -loglevel error -i <source> -c:v copy <target>`.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, source: &Path, target: &Path) -> bool {
        // would be read as options
        if looks_like_option(source) || looks_like_option(target) {
            warn!(source = %source.display(), target = %target.display(), "refusing path starting with `-`");
            return false;
        }

        let status = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(source)
            .args(["-c:v", "copy"])
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                info!(source = %source.display(), target = %target.display(), "transcoded");
                true
            }
            Ok(status) => {
                warn!(program = %self.program.display(), code = ?status.code(), "transcoder failed");
                false
            }
            Err(e) => {
                warn!(program = %self.program.display(), cause = %e, "can't run transcoder");
                false
            }
        }
    }
}

fn looks_like_option(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().starts_with('-')
}
