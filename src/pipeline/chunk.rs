//! Chunked upload session: send one large file as fixed-size byte ranges,
//! then ask the server to reassemble them.
//!
//! ## Ordering
//!
//! Chunks go out strictly one at a time, index 0 first. Every request
//! carries the session id, its index and the total count so the server can
//! check completeness at merge time.
//!
//! ## Failure
//!
//! The first chunk that does not succeed ends the session: no retry, no
//! further chunks, no merge. Chunks already stored are left for the server
//! to clean up.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::output::{PendingFile, UploadedChunkResult};
use crate::transport::{ChunkRequest, MergeRequest, UploadTransport};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Number of chunks needed for `file_size` bytes; zero for an empty file.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> u32 {
    let n = file_size.div_ceil(chunk_size.max(1));
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Generate a session id, preferring the OS random source.
///
/// When the OS source is unavailable a time-seeded generator fills in; the
/// result is still a correctly versioned v4 UUID.
pub fn generate_session_id() -> Uuid {
    let mut bytes = [0u8; 16];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => uuid::Builder::from_random_bytes(bytes).into_uuid(),
        Err(e) => {
            warn!("OS random source unavailable ({e}); using seeded session id");
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
                ^ u64::from(std::process::id());
            fallback_session_id(seed)
        }
    }
}

fn fallback_session_id(seed: u64) -> Uuid {
    let mut bytes = [0u8; 16];
    StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// One file's upload session. Lives only for the duration of the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUploadSession {
    pub session_id: Uuid,
    pub total_chunks: u32,
    pub chunk_size: u64,
    pub file_size: u64,
}

impl ChunkUploadSession {
    /// Plan a session for `file_size` bytes with a fresh session id.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        Self {
            session_id: generate_session_id(),
            total_chunks: total_chunks(file_size, chunk_size),
            chunk_size: chunk_size.max(1),
            file_size,
        }
    }

    /// Byte range of chunk `index`; the last chunk holds the remainder.
    pub fn chunk_range(&self, index: u32) -> Range<u64> {
        let start = (u64::from(index) * self.chunk_size).min(self.file_size);
        let end = (start + self.chunk_size).min(self.file_size);
        start..end
    }

    /// Send every chunk in order, then request the merge.
    pub async fn run(
        &self,
        file: &PendingFile,
        transport: &dyn UploadTransport,
        config: &UploadConfig,
    ) -> Result<UploadedChunkResult, UploadError> {
        let name = file.name();
        info!(
            "Chunked upload of '{}': {} bytes in {} chunks (session {})",
            name, self.file_size, self.total_chunks, self.session_id
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(name, self.total_chunks, self.file_size);
        }

        for index in 0..self.total_chunks {
            let range = self.chunk_range(index);
            let data = file.bytes().slice(range.start as usize..range.end as usize);
            debug!(
                "'{}': sending chunk {}/{} ({} bytes)",
                name,
                index + 1,
                self.total_chunks,
                data.len()
            );

            let request = ChunkRequest {
                session_id: self.session_id,
                index,
                total_chunks: self.total_chunks,
                file_name: name.to_string(),
                data,
            };

            if let Err(e) = transport.upload_chunk(request).await {
                warn!("'{}': chunk {} failed, abandoning session: {}", name, index, e);
                return Err(UploadError::ChunkFailed {
                    file: name.to_string(),
                    index,
                    total: self.total_chunks,
                    reason: e.to_string(),
                });
            }

            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_uploaded(name, index, self.total_chunks);
            }
        }

        let merge = MergeRequest {
            session_id: self.session_id,
            filename: name.to_string(),
            total_chunks: self.total_chunks,
        };
        let result = transport.merge_chunks(&merge).await.map_err(|e| {
            warn!("'{}': merge failed: {}", name, e);
            UploadError::MergeFailed {
                file: name.to_string(),
                reason: e.server_message().unwrap_or_else(|| e.to_string()),
            }
        })?;

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_merged(name);
        }
        info!("'{}' merged as {:?}", name, result.filename());
        Ok(result)
    }
}

/// Upload one file through a fresh chunked session.
pub async fn upload_chunked(
    file: &PendingFile,
    transport: &dyn UploadTransport,
    config: &UploadConfig,
) -> Result<UploadedChunkResult, UploadError> {
    ChunkUploadSession::new(file.size(), config.chunk_size)
        .run(file, transport, config)
        .await
}
