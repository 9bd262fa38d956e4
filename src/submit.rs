//! Note submission: the top-level entry point.
//!
//! Pipeline: validate form → upload large files in chunks → create or
//! update the note with the merge results and the small files attached.

use crate::batch::process_files_for_upload;
use crate::config::UploadConfig;
use crate::error::{TransportError, UploadError, ValidationError};
use crate::output::{NoteDraft, NoteResponse, NoteSubmission, NoteTarget};
use crate::progress::Notice;
use crate::selection::EditingContext;
use crate::transport::resolve_transport;
use std::time::Instant;
use tracing::{info, warn};

/// Check the form before any request is made. Returns the selected group.
///
/// A new note needs text or at least one file. An edit is also satisfied by
/// a kept existing image.
pub fn validate(ctx: &EditingContext, draft: &NoteDraft) -> Result<i64, ValidationError> {
    let has_content = !draft.content.trim().is_empty();
    let has_images = !ctx.is_empty() || !ctx.keep_image_ids().is_empty();
    if !has_content && !has_images {
        return Err(ValidationError::MissingContent);
    }
    draft.group_id.ok_or(ValidationError::MissingGroup)
}

/// Submit the form owned by `ctx` as a new note or an update.
///
/// On success a create clears the selection (the form stays open for the
/// next note) and an update closes the context. On failure the context is
/// left untouched so the user can retry; nothing already uploaded is
/// resumed, the whole submission runs again.
///
/// Every outcome is also reported as a [`Notice`] through the progress
/// callback.
///
/// # Example
/// ```rust,no_run
/// use groupnote_upload::{submit_note, EditingContext, NoteDraft, UploadConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = UploadConfig::builder().base_url("http://127.0.0.1:5000").build()?;
///     let mut ctx = EditingContext::create();
///     let draft = NoteDraft {
///         content: "Weekly sync".into(),
///         date: "2026-10-19".into(),
///         group_id: Some(3),
///     };
///     let note = submit_note(&mut ctx, &draft, &config).await?;
///     println!("saved note {:?}", note.id);
///     Ok(())
/// }
/// ```
pub async fn submit_note(
    ctx: &mut EditingContext,
    draft: &NoteDraft,
    config: &UploadConfig,
) -> Result<NoteResponse, UploadError> {
    let target = ctx.target();
    let result = run_submission(ctx, draft, target.clone(), config).await;

    match result {
        Ok(response) => {
            match target {
                NoteTarget::Create => {
                    config.notify(Notice::success("Note saved"));
                    ctx.clear();
                }
                NoteTarget::Update { .. } => {
                    config.notify(Notice::success("Note updated"));
                    ctx.close();
                }
            }
            Ok(response)
        }
        Err(e) => {
            warn!("Note submission failed: {}", e);
            config.notify(Notice::error(failure_message(&target, &e)));
            Err(e)
        }
    }
}

async fn run_submission(
    ctx: &EditingContext,
    draft: &NoteDraft,
    target: NoteTarget,
    config: &UploadConfig,
) -> Result<NoteResponse, UploadError> {
    let start = Instant::now();
    let group_id = validate(ctx, draft)?;
    let transport = resolve_transport(config)?;

    let files = ctx.pending_files();
    info!("Submitting note ({:?}) with {} file(s)", target, files.len());

    let outcome = process_files_for_upload(&files, transport.as_ref(), config).await?;

    let submission = NoteSubmission {
        target,
        content: draft.content.clone(),
        date: draft.date.clone(),
        group_id,
        uploaded_chunks: outcome.uploaded_chunks,
        images: outcome.bundled_files,
    };
    let response = transport
        .submit_note(submission)
        .await
        .map_err(note_error)?;

    info!(
        "Note {:?} saved in {}ms",
        response.id,
        start.elapsed().as_millis()
    );
    Ok(response)
}

fn note_error(e: TransportError) -> UploadError {
    match (&e, e.server_message()) {
        (TransportError::Status { status, .. }, Some(message)) => UploadError::NoteRejected {
            status: *status,
            message,
        },
        _ => UploadError::SubmitFailed {
            reason: e.to_string(),
        },
    }
}

fn failure_message(target: &NoteTarget, e: &UploadError) -> String {
    match e {
        UploadError::Validation(v) => v.to_string(),
        UploadError::NoteRejected { message, .. } => message.clone(),
        other => match target {
            NoteTarget::Create => format!("Save failed: {other}"),
            NoteTarget::Update { .. } => format!("Update failed: {other}"),
        },
    }
}

/// Synchronous wrapper around [`submit_note`].
///
/// Creates a temporary tokio runtime internally. Must not be called from
/// inside an async context.
pub fn submit_note_sync(
    ctx: &mut EditingContext,
    draft: &NoteDraft,
    config: &UploadConfig,
) -> Result<NoteResponse, UploadError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| UploadError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(submit_note(ctx, draft, config))
}
