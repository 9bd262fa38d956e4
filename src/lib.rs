//! # groupnote-upload
//!
//! Client-side attachment pipeline for a group-notes server: pick files,
//! show previews, and upload them alongside a note without tripping the
//! server's request-size limit.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Select    EditingContext::add_files; dedup by name + size
//!  ├─ 2. Preview   ≤150 px thumbnail per image (CPU-bound, spawn_blocking)
//!  ├─ 3. Validate  content or images, and a group
//!  ├─ 4. Route     > 5 MiB, or bundle over 10 MiB → chunked; rest bundled
//!  ├─ 5. Chunk     4 MiB chunks, one session id, sequential, then merge
//!  └─ 6. Submit    POST/PUT the note with merge results + bundled files
//! ```
//!
//! Previews are display-only: the original bytes are always what gets
//! uploaded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groupnote_upload::{
//!     load_pending_file, submit_note, EditingContext, NoteDraft, UploadConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UploadConfig::builder()
//!         .base_url("http://127.0.0.1:5000")
//!         .cookie("session=…")
//!         .build()?;
//!
//!     let mut ctx = EditingContext::create();
//!     let photo = load_pending_file("holiday.jpg").await?;
//!     ctx.add_files([photo], &config).await;
//!
//!     let draft = NoteDraft {
//!         content: "Trip photos".into(),
//!         date: "2026-10-19".into(),
//!         group_id: Some(1),
//!     };
//!     let note = submit_note(&mut ctx, &draft, &config).await?;
//!     println!("saved note {:?}", note.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Builds the `groupnote` binary (clap, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! groupnote-upload = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod selection;
pub mod submit;
pub mod transport;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::process_files_for_upload;
pub use config::{UploadConfig, UploadConfigBuilder};
pub use error::{ThumbnailError, TransportError, UploadError, ValidationError};
pub use output::{
    BatchOutcome, NoteDraft, NoteResponse, NoteSubmission, NoteTarget, PendingFile,
    UploadedChunkResult,
};
pub use pipeline::classify::{classify, UploadLimits, UploadPlan};
pub use pipeline::input::{load_pending_file, load_pending_files};
pub use pipeline::thumbnail::{create_preview, generate_thumbnail, thumbnail_dimensions};
pub use preview::{PreviewEntry, PreviewHandle, PreviewRegistry, Thumbnail};
pub use progress::{
    NoopProgressCallback, Notice, NoticeLevel, ProgressCallback, UploadProgressCallback,
};
pub use selection::{EditingContext, SelectionChange};
pub use submit::{submit_note, submit_note_sync, validate};
pub use transport::{HttpTransport, UploadTransport};
