//! Error types for the groupnote-upload library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`UploadError`]: **Fatal** for the current submission: validation
//!   failed, a chunk or merge request failed, or the server rejected the
//!   note. Returned as `Err(UploadError)` from the top-level entry points.
//!   The caller may retry the whole operation; nothing is resumed.
//!
//! * [`TransportError`]: what an [`crate::transport::UploadTransport`]
//!   reports for a single request. The pipeline wraps it into a labelled
//!   [`UploadError`] (which chunk index, or "merge failed").
//!
//! * [`ThumbnailError`]: **Non-fatal**: a preview could not be produced.
//!   Recovered locally by falling back to the original file bytes, so it
//!   never escapes file selection.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the groupnote-upload library.
#[derive(Debug, Error)]
pub enum UploadError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed part-way.
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Form errors ───────────────────────────────────────────────────────
    /// The note form is incomplete; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Upload errors ─────────────────────────────────────────────────────
    /// A chunk request did not succeed. The session was abandoned and no
    /// merge request was issued.
    #[error("Upload failed for chunk {index} of {total} ('{file}'): {reason}")]
    ChunkFailed {
        file: String,
        index: u32,
        total: u32,
        reason: String,
    },

    /// Every chunk was stored but the server could not reassemble them.
    #[error("Merge failed for '{file}': {reason}")]
    MergeFailed { file: String, reason: String },

    /// The note create/update request could not be delivered.
    #[error("Failed to submit note: {reason}")]
    SubmitFailed { reason: String },

    /// The server answered the note request with an `{error}` body.
    #[error("Server rejected the note (HTTP {status}): {message}")]
    NoteRejected { status: u16, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a note form was refused before any network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither text content nor any image (new or kept) was supplied.
    #[error("Enter note content or attach at least one image")]
    MissingContent,

    /// No group was selected for the note.
    #[error("Select a group for the note")]
    MissingGroup,
}

/// Failure of a single HTTP exchange with the notes server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response (connection refused, reset…).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response arrived but its body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// The `error` field of a JSON error body, if the server sent one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            TransportError::Status { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()?
                .get("error")?
                .as_str()
                .map(str::to_string),
            _ => None,
        }
    }
}

/// A non-fatal error while producing a preview.
///
/// Logged and replaced by a reference to the original bytes; see
/// [`crate::pipeline::thumbnail::create_preview`].
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// The bytes could not be decoded as an image.
    #[error("'{name}': image decode failed: {detail}")]
    Decode { name: String, detail: String },

    /// The media type has no encoder/decoder available.
    #[error("'{name}': unsupported image format '{mime_type}'")]
    UnsupportedFormat { name: String, mime_type: String },

    /// Re-encoding the downscaled image failed.
    #[error("'{name}': thumbnail encode failed: {detail}")]
    Encode { name: String, detail: String },

    /// The blocking worker panicked or was cancelled.
    #[error("'{name}': thumbnail task failed: {detail}")]
    TaskFailed { name: String, detail: String },
}
