//! Data types flowing through the upload pipeline.
//!
//! [`PendingFile`] is what the user selected; [`UploadedChunkResult`] is what
//! the server hands back after a merge; [`BatchOutcome`] is what the
//! orchestrator attaches to the note request.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A file selected for upload.
///
/// Immutable once created: `size` always equals the buffer length and the
/// buffer is shared, so cloning is cheap and never copies file contents.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    bytes: Bytes,
    name: String,
    mime_type: String,
}

impl PendingFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes, fixed at selection time.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The raw bytes. This, never a preview, is what gets uploaded.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Descriptor returned by the server for a merged file.
///
/// Opaque to the client: it is collected in upload order and sent back
/// verbatim inside the note request's `uploaded_chunks` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadedChunkResult(pub serde_json::Value);

impl UploadedChunkResult {
    /// Server-side path of the reassembled file, when present.
    pub fn filename(&self) -> Option<&str> {
        self.0.get("filename").and_then(|v| v.as_str())
    }

    /// Name the file was uploaded under, when present.
    pub fn original_filename(&self) -> Option<&str> {
        self.0.get("original_filename").and_then(|v| v.as_str())
    }
}

/// Result of running the batch orchestrator over one submission's files.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Merge descriptors, in input order of the chunked files.
    pub uploaded_chunks: Vec<UploadedChunkResult>,
    /// Files to attach directly to the note request, in input order.
    pub bundled_files: Vec<PendingFile>,
}

/// The text fields of the note form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteDraft {
    pub content: String,
    /// Note date as the form supplies it (`YYYY-MM-DD`).
    pub date: String,
    /// Selected group; `None` until the user picks one.
    pub group_id: Option<i64>,
}

/// Which note request a submission turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteTarget {
    /// `POST /api/notes`
    Create,
    /// `PUT /api/notes/{note_id}`, keeping only the listed existing images.
    Update { note_id: i64, keep_images: Vec<i64> },
}

/// A fully prepared note request, ready for the transport.
#[derive(Debug, Clone)]
pub struct NoteSubmission {
    pub target: NoteTarget,
    pub content: String,
    pub date: String,
    pub group_id: i64,
    pub uploaded_chunks: Vec<UploadedChunkResult>,
    pub images: Vec<PendingFile>,
}

/// The server's answer to a successful create/update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Everything else the server returned (saved images etc.).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
