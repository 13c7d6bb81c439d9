use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::ensure;
use crate::multipart::MAX_FILENAME_LENGTH;
use crate::protocol::UploadError;

/// Maximum number of names tried before giving up.
pub const MAX_COLLISION_ATTEMPTS: usize = 50;

/// Returns `candidate`, or the first derived name nothing exists at.
///
/// Each attempt inserts a `2` right before the extension dot of the file name
/// (`a.mp4`, `a2.mp4`, `a22.mp4`, ...), or appends it when there is no extension.
pub fn resolve_collision(candidate: &Path) -> Result<PathBuf, UploadError> {
    resolve_collision_with(candidate, Path::exists)
}

/// [`resolve_collision`] with a custom existence check.
pub fn resolve_collision_with<F>(candidate: &Path, mut exists: F) -> Result<PathBuf, UploadError>
where
    F: FnMut(&Path) -> bool,
{
    let mut path = candidate.to_path_buf();
    for _ in 0..MAX_COLLISION_ATTEMPTS {
        if !exists(&path) {
            return Ok(path);
        }
        path = bump(&path);
    }

    Err(UploadError::NameExhausted { candidate: candidate.display().to_string(), attempts: MAX_COLLISION_ATTEMPTS })
}

fn bump(path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    let bumped = match file_name.rfind('.') {
        Some(dot) => format!("{}2{}", &file_name[..dot], &file_name[dot..]),
        None => format!("{file_name}2"),
    };
    path.with_file_name(OsString::from(bumped))
}

/// Reduces a client-supplied filename to a safe single path component.
///
/// Only the text after the last `/` or `\` is kept. Empty names, `.` and `..`, names with
/// control characters and names starting with `-` are rejected.
pub fn sanitize_filename(client_name: &str) -> Result<String, UploadError> {
    let name = client_name.rsplit(['/', '\\']).next().unwrap_or_default();

    ensure!(!name.is_empty(), UploadError::invalid_filename("empty filename"));
    ensure!(name != "." && name != "..", UploadError::invalid_filename(format!("`{name}` is not a file name")));
    ensure!(!name.starts_with('-'), UploadError::invalid_filename("filename starts with `-`"));
    ensure!(!name.chars().any(char::is_control), UploadError::invalid_filename("filename contains control characters"));
    ensure!(name.len() <= MAX_FILENAME_LENGTH, UploadError::name_too_long(name.len(), MAX_FILENAME_LENGTH));

    Ok(name.to_string())
}

/// Creates the first free file derived from `candidate` and returns its path together with
/// the new file, opened for writing.
///
/// Names follow [`resolve_collision`], but every attempt is a `create_new`, so a name is
/// never handed out twice, even to connections racing for it.
pub async fn reserve(candidate: &Path) -> Result<(PathBuf, File), UploadError> {
    reserve_skipping(candidate, |_| false).await
}

async fn reserve_skipping<F>(candidate: &Path, skip: F) -> Result<(PathBuf, File), UploadError>
where
    F: Fn(&Path) -> bool,
{
    let mut path = candidate.to_path_buf();
    for _ in 0..MAX_COLLISION_ATTEMPTS {
        if !skip(&path) {
            match File::create_new(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        path = bump(&path);
    }

    Err(UploadError::NameExhausted { candidate: candidate.display().to_string(), attempts: MAX_COLLISION_ATTEMPTS })
}

/// Reserves the `.mp4` file the transcoded output of `source` is written to.
///
/// The returned path exists as an empty file and is never `source`, even when `source`
/// already has the `mp4` extension.
pub async fn transcode_target(source: &Path) -> Result<PathBuf, UploadError> {
    let (path, _file) = reserve_skipping(&source.with_extension("mp4"), |path| path == source).await?;
    Ok(path)
}
