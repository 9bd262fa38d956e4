//! Batch orchestration: route every pending file, run the chunked sessions,
//! and hand back what the note request needs.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::output::{BatchOutcome, PendingFile};
use crate::pipeline::chunk::upload_chunked;
use crate::pipeline::classify::{classify, UploadLimits};
use crate::progress::Notice;
use crate::transport::UploadTransport;
use tracing::info;

/// Upload the large files of a submission and collect the small ones.
///
/// Files are classified once. Each chunked file, in input order, is
/// announced with an info notice and uploaded to completion before the next
/// one starts. The first failure is returned immediately; files uploaded
/// before it are not rolled back and the rest are never attempted.
///
/// Bundled files are returned untouched for the caller to attach to the
/// note request.
pub async fn process_files_for_upload(
    files: &[PendingFile],
    transport: &dyn UploadTransport,
    config: &UploadConfig,
) -> Result<BatchOutcome, UploadError> {
    let plan = classify(files, &UploadLimits::from(config));
    info!(
        "Upload plan: {} chunked, {} bundled ({} bytes)",
        plan.chunked.len(),
        plan.bundled.len(),
        plan.bundled_bytes
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(plan.chunked.len(), plan.bundled.len());
    }

    let mut uploaded_chunks = Vec::with_capacity(plan.chunked.len());
    for file in &plan.chunked {
        config.notify(Notice::info(format!("Uploading in chunks: {}…", file.name())));
        uploaded_chunks.push(upload_chunked(file, transport, config).await?);
    }

    let outcome = BatchOutcome {
        uploaded_chunks,
        bundled_files: plan.bundled.into_iter().cloned().collect(),
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(outcome.uploaded_chunks.len(), outcome.bundled_files.len());
    }
    info!(
        "Batch complete: {} merged, {} to bundle",
        outcome.uploaded_chunks.len(),
        outcome.bundled_files.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoticeLevel, UploadProgressCallback};
    use crate::test_support::{Call, RecordingTransport};
    use std::sync::{Arc, Mutex};

    const MIB: usize = 1024 * 1024;

    fn file(name: &str, size: usize) -> PendingFile {
        PendingFile::new(name, "image/jpeg", vec![7u8; size])
    }

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl UploadProgressCallback for EventLog {
        fn on_file_start(&self, file_name: &str, _total: u32, _size: u64) {
            self.0.lock().unwrap().push(format!("start {file_name}"));
        }

        fn on_notice(&self, notice: &Notice) {
            assert_eq!(notice.level, NoticeLevel::Info);
            self.0.lock().unwrap().push(notice.message.clone());
        }
    }

    #[tokio::test]
    async fn twelve_plus_one_mib_gives_one_session_and_one_bundled() {
        let transport = RecordingTransport::new();
        let files = vec![file("photo.jpg", 12 * MIB), file("small.jpg", MIB)];

        let outcome = process_files_for_upload(&files, &transport, &UploadConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.uploaded_chunks.len(), 1);
        assert_eq!(outcome.uploaded_chunks[0].original_filename(), Some("photo.jpg"));
        assert_eq!(outcome.bundled_files.len(), 1);
        assert_eq!(outcome.bundled_files[0].name(), "small.jpg");

        let calls = transport.calls();
        let chunks = calls.iter().filter(|c| matches!(c, Call::Chunk { .. })).count();
        let merges = calls.iter().filter(|c| matches!(c, Call::Merge { .. })).count();
        assert_eq!(chunks, 3);
        assert_eq!(merges, 1);
    }

    #[tokio::test]
    async fn small_files_send_nothing() {
        let transport = RecordingTransport::new();
        let files = vec![file("a.jpg", 1024), file("b.jpg", 2048)];

        let outcome = process_files_for_upload(&files, &transport, &UploadConfig::default())
            .await
            .unwrap();

        assert!(outcome.uploaded_chunks.is_empty());
        assert_eq!(outcome.bundled_files.len(), 2);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_abandons_remaining_files() {
        let transport = RecordingTransport::new().fail_file("second.jpg");
        let config = UploadConfig::builder()
            .chunk_size(4)
            .chunk_threshold(8)
            .build()
            .unwrap();
        let files = vec![file("first.jpg", 10), file("second.jpg", 10), file("third.jpg", 10)];

        let err = process_files_for_upload(&files, &transport, &config)
            .await
            .unwrap_err();
        match err {
            UploadError::ChunkFailed { ref file, index, .. } => {
                assert_eq!(file, "second.jpg");
                assert_eq!(index, 0);
            }
            other => panic!("expected ChunkFailed, got {other:?}"),
        }

        let calls = transport.calls();
        // first: 3 chunks + merge; second: the failed chunk 0; third: nothing
        assert_eq!(calls.len(), 5);
        assert!(matches!(calls[3], Call::Merge { ref filename, .. } if filename == "first.jpg"));
    }

    #[tokio::test]
    async fn notice_precedes_each_chunked_file() {
        let log = Arc::new(EventLog::default());
        let config = UploadConfig::builder()
            .chunk_size(4)
            .chunk_threshold(8)
            .progress_callback(log.clone())
            .build()
            .unwrap();
        let files = vec![file("a.jpg", 9), file("tiny.jpg", 2), file("b.jpg", 12)];

        process_files_for_upload(&files, &RecordingTransport::new(), &config)
            .await
            .unwrap();

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                "Uploading in chunks: a.jpg…",
                "start a.jpg",
                "Uploading in chunks: b.jpg…",
                "start b.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn merge_results_keep_input_order() {
        let transport = RecordingTransport::new();
        let config = UploadConfig::builder()
            .chunk_size(4)
            .chunk_threshold(4)
            .build()
            .unwrap();
        let files = vec![file("z.jpg", 5), file("a.jpg", 5)];

        let outcome = process_files_for_upload(&files, &transport, &config)
            .await
            .unwrap();
        let names: Vec<_> = outcome
            .uploaded_chunks
            .iter()
            .map(|r| r.original_filename().unwrap())
            .collect();
        assert_eq!(names, vec!["z.jpg", "a.jpg"]);
    }
}
