//! Configuration types for the upload pipeline.
//!
//! All upload behaviour is controlled through [`UploadConfig`], built via its
//! [`UploadConfigBuilder`]. The size limits live here rather than as
//! constants in the pipeline so tests and servers with different request
//! ceilings can reconfigure them without touching the routing logic.

use crate::error::UploadError;
use crate::progress::{Notice, ProgressCallback};
use crate::transport::UploadTransport;
use std::fmt;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

/// Size of every chunk except the last: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * MIB;

/// Files strictly larger than this always go through a chunked session: 5 MiB.
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 5 * MIB;

/// Ceiling on the combined size of files bundled into the note request: 10 MiB.
pub const DEFAULT_BATCH_CEILING: u64 = 10 * MIB;

/// Longest edge of a preview, in pixels.
pub const DEFAULT_THUMBNAIL_MAX_EDGE: u32 = 150;

/// JPEG quality for previews (0.7 on a 0–1 scale).
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 70;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Configuration for uploading note attachments.
///
/// Built via [`UploadConfig::builder()`] or using
/// [`UploadConfig::default()`].
///
/// # Example
/// ```rust
/// use groupnote_upload::UploadConfig;
///
/// let config = UploadConfig::builder()
///     .base_url("https://notes.example.com")
///     .chunk_threshold(8 * 1024 * 1024)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct UploadConfig {
    /// Root URL of the notes server; endpoints are resolved against it.
    pub base_url: String,

    /// Bytes per chunk request. Default: 4 MiB.
    pub chunk_size: u64,

    /// Per-file size above which a file is always chunked. Default: 5 MiB.
    pub chunk_threshold: u64,

    /// Maximum running total of bundled files. Default: 10 MiB.
    ///
    /// A file that would push the bundled total past this ceiling is chunked
    /// instead, even if it is individually small.
    pub batch_ceiling: u64,

    /// Longest preview edge in pixels. Default: 150.
    pub thumbnail_max_edge: u32,

    /// Lossy preview quality, 1–100. Default: 70.
    pub thumbnail_quality: u8,

    /// Per-request timeout in seconds. Default: none.
    ///
    /// Left unset, a hung request blocks its operation until the transport
    /// layer itself gives up.
    pub request_timeout_secs: Option<u64>,

    /// Raw `Cookie` header value forwarded on every request.
    pub cookie: Option<String>,

    /// Pre-constructed transport. Takes precedence over `base_url`.
    pub transport: Option<Arc<dyn UploadTransport>>,

    /// Optional progress callback receiving batch events and notices.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            batch_ceiling: DEFAULT_BATCH_CEILING,
            thumbnail_max_edge: DEFAULT_THUMBNAIL_MAX_EDGE,
            thumbnail_quality: DEFAULT_THUMBNAIL_QUALITY,
            request_timeout_secs: None,
            cookie: None,
            transport: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("base_url", &self.base_url)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_threshold", &self.chunk_threshold)
            .field("batch_ceiling", &self.batch_ceiling)
            .field("thumbnail_max_edge", &self.thumbnail_max_edge)
            .field("thumbnail_quality", &self.thumbnail_quality)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("transport", &self.transport.as_ref().map(|_| "<dyn UploadTransport>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn UploadProgressCallback>"),
            )
            .finish()
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Forward a notice to the progress callback, if any.
    pub(crate) fn notify(&self, notice: Notice) {
        if let Some(ref cb) = self.progress_callback {
            cb.on_notice(&notice);
        }
    }
}

/// Builder for [`UploadConfig`].
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl fmt::Debug for UploadConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl UploadConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn chunk_threshold(mut self, bytes: u64) -> Self {
        self.config.chunk_threshold = bytes;
        self
    }

    pub fn batch_ceiling(mut self, bytes: u64) -> Self {
        self.config.batch_ceiling = bytes;
        self
    }

    pub fn thumbnail_max_edge(mut self, px: u32) -> Self {
        self.config.thumbnail_max_edge = px;
        self
    }

    pub fn thumbnail_quality(mut self, quality: u8) -> Self {
        self.config.thumbnail_quality = quality;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.config.cookie = Some(cookie.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    /// Register a callback for upload events and notices.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploadConfig, UploadError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(UploadError::InvalidConfig("Chunk size must be ≥ 1 byte".into()));
        }
        if c.thumbnail_max_edge == 0 {
            return Err(UploadError::InvalidConfig(
                "Thumbnail edge must be ≥ 1 px".into(),
            ));
        }
        if !(1..=100).contains(&c.thumbnail_quality) {
            return Err(UploadError::InvalidConfig(format!(
                "Thumbnail quality must be 1–100, got {}",
                c.thumbnail_quality
            )));
        }
        if c.transport.is_none() {
            reqwest::Url::parse(&c.base_url).map_err(|e| {
                UploadError::InvalidConfig(format!("Invalid server URL '{}': {e}", c.base_url))
            })?;
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_limits() {
        let c = UploadConfig::default();
        assert_eq!(c.chunk_size, 4 * 1024 * 1024);
        assert_eq!(c.chunk_threshold, 5 * 1024 * 1024);
        assert_eq!(c.batch_ceiling, 10 * 1024 * 1024);
        assert_eq!(c.thumbnail_max_edge, 150);
        assert_eq!(c.thumbnail_quality, 70);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = UploadConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_bad_quality() {
        assert!(UploadConfig::builder().thumbnail_quality(0).build().is_err());
        assert!(UploadConfig::builder().thumbnail_quality(101).build().is_err());
        assert!(UploadConfig::builder().thumbnail_quality(100).build().is_ok());
    }

    #[test]
    fn builder_rejects_unparseable_url() {
        let err = UploadConfig::builder().base_url("not a url").build().unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn debug_redacts_cookie() {
        let c = UploadConfig::builder().cookie("session=secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
