//! The editing context: everything an open note form owns.
//!
//! One [`EditingContext`] exists per open create-note or edit-note form. It
//! holds the pending files with their previews, the existing images an edit
//! keeps, and the close signal that stops in-progress selection work. All
//! operations take it by `&mut`, so there is no shared global selection.
//!
//! ## Cancellation
//!
//! [`EditingContext::add_files`] checks the close signal before each file
//! and again after its preview is generated. Closing the form while a
//! thumbnail is being produced discards that thumbnail and stops the loop.
//! Network requests are never interrupted by it.

use crate::config::UploadConfig;
use crate::output::{NoteTarget, PendingFile};
use crate::pipeline::thumbnail::create_preview;
use crate::preview::{PreviewEntry, PreviewRegistry};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An image already attached to the note being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingImage {
    pub id: i64,
    pub keep: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Create,
    Edit {
        note_id: i64,
        existing: Vec<ExistingImage>,
    },
}

/// What one call to [`EditingContext::add_files`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionChange {
    /// Files appended to the selection.
    pub added: usize,
    /// Names of files skipped because the same name and size was pending.
    pub duplicates: Vec<String>,
    /// The form was closed before the loop finished.
    pub cancelled: bool,
}

/// State of one open note form.
#[derive(Debug)]
pub struct EditingContext {
    mode: Mode,
    entries: Vec<PreviewEntry>,
    registry: PreviewRegistry,
    close: CancellationToken,
}

impl EditingContext {
    /// Context for the create-note form.
    pub fn create() -> Self {
        Self::with_mode(Mode::Create)
    }

    /// Context for editing `note_id`, whose existing images all start out kept.
    pub fn edit(note_id: i64, existing_image_ids: impl IntoIterator<Item = i64>) -> Self {
        let existing = existing_image_ids
            .into_iter()
            .map(|id| ExistingImage { id, keep: true })
            .collect();
        Self::with_mode(Mode::Edit { note_id, existing })
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
            registry: PreviewRegistry::new(),
            close: CancellationToken::new(),
        }
    }

    /// The note being edited, `None` for a new note.
    pub fn note_id(&self) -> Option<i64> {
        match self.mode {
            Mode::Create => None,
            Mode::Edit { note_id, .. } => Some(note_id),
        }
    }

    /// The request a submission from this form becomes.
    pub fn target(&self) -> NoteTarget {
        match &self.mode {
            Mode::Create => NoteTarget::Create,
            Mode::Edit { note_id, .. } => NoteTarget::Update {
                note_id: *note_id,
                keep_images: self.keep_image_ids(),
            },
        }
    }

    pub fn entries(&self) -> &[PreviewEntry] {
        &self.entries
    }

    /// The selected files, in selection order.
    pub fn pending_files(&self) -> Vec<PendingFile> {
        self.entries.iter().map(|e| e.file.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// A handle on the close signal, for tasks that must stop with the form.
    pub fn close_signal(&self) -> CancellationToken {
        self.close.clone()
    }

    fn is_duplicate(&self, file: &PendingFile) -> bool {
        self.entries
            .iter()
            .any(|e| e.file.name() == file.name() && e.file.size() == file.size())
    }

    /// Add newly selected files, generating a preview for each.
    ///
    /// Files already pending under the same name and size are skipped.
    /// Control returns to the scheduler between files so other work keeps
    /// running during a large selection.
    pub async fn add_files(
        &mut self,
        files: impl IntoIterator<Item = PendingFile>,
        config: &UploadConfig,
    ) -> SelectionChange {
        let mut change = SelectionChange::default();

        for file in files {
            if self.close.is_cancelled() {
                change.cancelled = true;
                break;
            }
            if self.is_duplicate(&file) {
                debug!("Skipping duplicate selection '{}' ({} bytes)", file.name(), file.size());
                change.duplicates.push(file.name().to_string());
                continue;
            }

            tokio::task::yield_now().await;
            let preview = create_preview(&file, &self.registry, config).await;

            if self.close.is_cancelled() {
                debug!("Form closed while previewing '{}'; discarding", file.name());
                preview.release();
                change.cancelled = true;
                break;
            }

            self.entries.push(PreviewEntry { file, preview });
            change.added += 1;
        }

        change
    }

    /// Remove the entry at `index`, releasing its preview.
    pub fn remove(&mut self, index: usize) -> Option<PendingFile> {
        if index >= self.entries.len() {
            return None;
        }
        let PreviewEntry { file, preview } = self.entries.remove(index);
        preview.release();
        Some(file)
    }

    /// Drop every pending file and release all previews.
    pub fn clear(&mut self) {
        debug!("Clearing {} pending file(s)", self.entries.len());
        self.entries.clear();
    }

    /// Close the form: signal in-progress work to stop and clear the selection.
    pub fn close(&mut self) {
        self.close.cancel();
        self.clear();
    }

    /// Flip whether an existing image is kept. Returns the new state, or
    /// `None` if `image_id` is not one of this note's images.
    pub fn toggle_existing_image(&mut self, image_id: i64) -> Option<bool> {
        let Mode::Edit { existing, .. } = &mut self.mode else {
            return None;
        };
        let image = existing.iter_mut().find(|img| img.id == image_id)?;
        image.keep = !image.keep;
        Some(image.keep)
    }

    /// Ids of existing images still kept, in their original order.
    pub fn keep_image_ids(&self) -> Vec<i64> {
        match &self.mode {
            Mode::Create => Vec::new(),
            Mode::Edit { existing, .. } => existing
                .iter()
                .filter(|img| img.keep)
                .map(|img| img.id)
                .collect(),
        }
    }
}
