//! Progress-callback trait for upload events and user-visible notices.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::UploadConfigBuilder::progress_callback`] to receive
//! events as the pipeline uploads each file and chunk.
//!
//! # Notices
//!
//! [`UploadProgressCallback::on_notice`] carries the short, human-readable
//! messages a UI shows as transient notifications ("toasts"): the
//! "uploading in chunks" heads-up before each large file, and the final
//! success or failure of a submission. The library never renders them.
//!
//! # Example
//!
//! ```rust
//! use groupnote_upload::{Notice, UploadConfig, UploadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     chunks: AtomicUsize,
//! }
//!
//! impl UploadProgressCallback for CountingCallback {
//!     fn on_chunk_uploaded(&self, file_name: &str, index: u32, total: u32) {
//!         self.chunks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file_name}: chunk {}/{}", index + 1, total);
//!     }
//!
//!     fn on_notice(&self, notice: &Notice) {
//!         eprintln!("{}", notice.message);
//!     }
//! }
//!
//! let config = UploadConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { chunks: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient, human-readable notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Called by the upload pipeline as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive strictly in order: the pipeline never
/// runs two uploads at once.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once after classification, before any request is sent.
    ///
    /// # Arguments
    /// * `chunked_files`: files that will go through a chunked session
    /// * `bundled_files`: files that will ride along with the note request
    fn on_batch_start(&self, chunked_files: usize, bundled_files: usize) {
        let _ = (chunked_files, bundled_files);
    }

    /// Called before the first chunk of a file is sent.
    ///
    /// # Arguments
    /// * `file_name`   : name of the file being uploaded
    /// * `total_chunks`: number of chunk requests the session will make
    /// * `file_size`   : size in bytes
    fn on_file_start(&self, file_name: &str, total_chunks: u32, file_size: u64) {
        let _ = (file_name, total_chunks, file_size);
    }

    /// Called after the server accepted a chunk.
    ///
    /// # Arguments
    /// * `index`: zero-based chunk index
    /// * `total`: total chunks for this file
    fn on_chunk_uploaded(&self, file_name: &str, index: u32, total: u32) {
        let _ = (file_name, index, total);
    }

    /// Called after the merge request for a file succeeded.
    fn on_file_merged(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Called once after every chunked file has been merged.
    fn on_batch_complete(&self, uploaded_chunks: usize, bundled_files: usize) {
        let _ = (uploaded_chunks, bundled_files);
    }

    /// Called with every user-visible notice.
    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::UploadConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;
