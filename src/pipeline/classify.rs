//! Upload routing: decide which files ride along with the note request and
//! which need their own chunked session.
//!
//! A file is chunked when it is individually over the per-file threshold,
//! **or** when adding it would push the bundled total past the batch
//! ceiling. Both conditions are checked for every file, in input order, and
//! only bundled files count toward the running total.

use crate::config::UploadConfig;
use crate::output::PendingFile;

/// Size limits used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub chunk_threshold: u64,
    pub batch_ceiling: u64,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            chunk_threshold: config.chunk_threshold,
            batch_ceiling: config.batch_ceiling,
        }
    }
}

/// How a single file will be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Bundled,
    Chunked,
}

/// Result of routing one batch. Both lists keep input order.
#[derive(Debug, Default)]
pub struct UploadPlan<'a> {
    pub chunked: Vec<&'a PendingFile>,
    pub bundled: Vec<&'a PendingFile>,
    /// Sum of the bundled files' sizes; never above the ceiling.
    pub bundled_bytes: u64,
}

/// Route one file given the bundled total collected so far.
pub fn route(size: u64, bundled_so_far: u64, limits: &UploadLimits) -> Route {
    if size > limits.chunk_threshold || bundled_so_far.saturating_add(size) > limits.batch_ceiling {
        Route::Chunked
    } else {
        Route::Bundled
    }
}

/// Partition `files` into chunked and bundled groups. Issues no I/O.
pub fn classify<'a>(files: &'a [PendingFile], limits: &UploadLimits) -> UploadPlan<'a> {
    let mut plan = UploadPlan::default();
    for file in files {
        match route(file.size(), plan.bundled_bytes, limits) {
            Route::Chunked => plan.chunked.push(file),
            Route::Bundled => {
                plan.bundled_bytes += file.size();
                plan.bundled.push(file);
            }
        }
    }
    plan
}
