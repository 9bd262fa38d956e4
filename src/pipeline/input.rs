//! Input resolution: read a user-supplied local path into a [`PendingFile`].
//!
//! The media type is guessed from the file extension using the `image`
//! crate's format table, which covers every type a preview can be made for.
//! Anything else is uploaded as `application/octet-stream` and previewed as
//! the original file.

use crate::error::UploadError;
use crate::output::PendingFile;
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Guess the media type of `path` from its extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}

/// Read a local file into memory as a [`PendingFile`].
pub async fn load_pending_file(path: impl AsRef<Path>) -> Result<PendingFile, UploadError> {
    let path = path.as_ref();

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => UploadError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => UploadError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => UploadError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let name = file_name(path);
    let mime = guess_mime_type(path);
    debug!("Loaded '{}' ({} bytes, {})", name, bytes.len(), mime);

    Ok(PendingFile::new(name, mime, bytes))
}

/// Load several paths, stopping at the first one that cannot be read.
pub async fn load_pending_files(paths: &[PathBuf]) -> Result<Vec<PendingFile>, UploadError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(load_pending_file(path).await?);
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string())
}
