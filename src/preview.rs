//! Display-only preview resources and their accounting.
//!
//! Every preview shown for a pending file holds a [`PreviewHandle`]
//! allocated from a [`PreviewRegistry`]. A handle is released exactly once:
//! explicitly through [`PreviewHandle::release`] or implicitly when it is
//! dropped. The registry counts allocations and releases so owners can
//! verify nothing leaks when a form is cleared or closed.

use crate::output::PendingFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A downscaled, re-encoded image for local display.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// What a preview displays.
#[derive(Debug, Clone)]
pub enum PreviewSource {
    /// A generated thumbnail.
    Thumbnail(Thumbnail),
    /// The original file, shown unscaled (non-images and failed thumbnails).
    Original(PendingFile),
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    allocated: AtomicU64,
    released: AtomicU64,
}

impl RegistryInner {
    fn release(&self, id: u64) -> bool {
        let removed = self
            .live
            .lock()
            .map(|mut live| live.remove(&id))
            .unwrap_or(false);
        if removed {
            self.released.fetch_add(1, Ordering::SeqCst);
            debug!("Released preview handle {}", id);
        } else {
            warn!("Preview handle {} released twice or never allocated", id);
        }
        removed
    }
}

/// Allocates preview handles and tracks which are still live.
///
/// Cloning shares the same accounting.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live())
            .field("allocated", &self.allocated())
            .field("released", &self.released())
            .finish()
    }
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for `source`.
    pub fn allocate(&self, source: PreviewSource) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut live) = self.inner.live.lock() {
            live.insert(id);
        }
        self.inner.allocated.fetch_add(1, Ordering::SeqCst);
        PreviewHandle {
            id,
            source,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Handles allocated and not yet released.
    pub fn live(&self) -> usize {
        self.inner.live.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn allocated(&self) -> u64 {
        self.inner.allocated.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }
}

/// A live preview resource. Released when dropped.
pub struct PreviewHandle {
    id: u64,
    source: PreviewSource,
    registry: Arc<RegistryInner>,
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish()
    }
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &PreviewSource {
        &self.source
    }

    /// `true` when a thumbnail was generated, `false` for the original-file fallback.
    pub fn is_thumbnail(&self) -> bool {
        matches!(self.source, PreviewSource::Thumbnail(_))
    }

    /// Bytes to display.
    pub fn bytes(&self) -> &Bytes {
        match &self.source {
            PreviewSource::Thumbnail(t) => &t.bytes,
            PreviewSource::Original(f) => f.bytes(),
        }
    }

    pub fn mime_type(&self) -> &str {
        match &self.source {
            PreviewSource::Thumbnail(t) => &t.mime_type,
            PreviewSource::Original(f) => f.mime_type(),
        }
    }

    /// Thumbnail size in pixels; unknown for the original-file fallback.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match &self.source {
            PreviewSource::Thumbnail(t) => Some((t.width, t.height)),
            PreviewSource::Original(_) => None,
        }
    }

    /// A `data:` URI suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(self.bytes()))
    }

    /// Release the resource now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// A pending file together with its preview.
#[derive(Debug)]
pub struct PreviewEntry {
    pub file: PendingFile,
    pub preview: PreviewHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original(name: &str) -> PreviewSource {
        PreviewSource::Original(PendingFile::new(name, "application/pdf", vec![1, 2, 3]))
    }

    #[test]
    fn release_is_counted_once() {
        let registry = PreviewRegistry::new();
        let a = registry.allocate(original("a.pdf"));
        let b = registry.allocate(original("b.pdf"));
        assert_eq!(registry.live(), 2);
        assert_ne!(a.id(), b.id());

        a.release();
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.released(), 1);

        drop(b);
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.allocated(), 2);
        assert_eq!(registry.released(), 2);
    }

    #[test]
    fn stray_release_is_refused() {
        let registry = PreviewRegistry::new();
        assert!(!registry.inner.release(99));
        assert_eq!(registry.released(), 0);
    }

    #[test]
    fn original_fallback_exposes_file_bytes() {
        let registry = PreviewRegistry::new();
        let h = registry.allocate(original("doc.pdf"));
        assert!(!h.is_thumbnail());
        assert_eq!(h.dimensions(), None);
        assert_eq!(h.bytes().as_ref(), &[1, 2, 3]);
        assert_eq!(h.data_uri(), "data:application/pdf;base64,AQID");
    }

    #[test]
    fn thumbnail_reports_dimensions() {
        let registry = PreviewRegistry::new();
        let h = registry.allocate(PreviewSource::Thumbnail(Thumbnail {
            bytes: Bytes::from_static(b"png"),
            width: 150,
            height: 75,
            mime_type: "image/png".into(),
        }));
        assert!(h.is_thumbnail());
        assert_eq!(h.dimensions(), Some((150, 75)));
        assert!(h.data_uri().starts_with("data:image/png;base64,"));
    }
}
