use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Files of one connection that are deleted when it closes.
///
/// Handlers get a handle through [`Request::scratch`](crate::protocol::Request::scratch) and
/// register a file before anything is written to it, so a connection torn down mid-request
/// still removes it.
#[derive(Debug, Clone, Default)]
pub struct ScratchFiles {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScratchFiles {
    pub fn register(&self, path: PathBuf) {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).push(path);
    }

    /// Empties the registry, returning what was in it.
    pub fn take(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.paths.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
