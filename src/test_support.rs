//! In-memory transport that records every request, for unit tests.

use crate::error::TransportError;
use crate::output::{NoteResponse, NoteSubmission, NoteTarget, UploadedChunkResult};
use crate::transport::{ChunkRequest, MergeRequest, UploadTransport};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Chunk {
        session_id: Uuid,
        index: u32,
        total: u32,
        len: usize,
    },
    Merge {
        session_id: Uuid,
        filename: String,
        total: u32,
    },
    Submit {
        target: NoteTarget,
        content: String,
        group_id: i64,
        uploaded_chunks: usize,
        images: Vec<String>,
    },
}

#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    bytes: Mutex<Vec<u8>>,
    fail_chunk: Option<u32>,
    fail_file: Option<String>,
    fail_merge: bool,
    reject_note: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every chunk request with this index.
    pub fn fail_chunk(mut self, index: u32) -> Self {
        self.fail_chunk = Some(index);
        self
    }

    /// Fail the first chunk of the file with this name.
    pub fn fail_file(mut self, name: &str) -> Self {
        self.fail_file = Some(name.to_string());
        self
    }

    pub fn fail_merge(mut self) -> Self {
        self.fail_merge = true;
        self
    }

    /// Answer note requests with `{"error": message}` and HTTP 400.
    pub fn reject_note(mut self, message: &str) -> Self {
        self.reject_note = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Concatenation of every chunk payload received, in arrival order.
    pub fn received_bytes(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn upload_chunk(&self, chunk: ChunkRequest) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Chunk {
            session_id: chunk.session_id,
            index: chunk.index,
            total: chunk.total_chunks,
            len: chunk.data.len(),
        });

        let file_fails =
            chunk.index == 0 && self.fail_file.as_deref() == Some(chunk.file_name.as_str());
        if self.fail_chunk == Some(chunk.index) || file_fails {
            return Err(TransportError::Status {
                status: 500,
                body: "disk full".into(),
            });
        }

        self.bytes.lock().unwrap().extend_from_slice(&chunk.data);
        Ok(())
    }

    async fn merge_chunks(
        &self,
        request: &MergeRequest,
    ) -> Result<UploadedChunkResult, TransportError> {
        self.calls.lock().unwrap().push(Call::Merge {
            session_id: request.session_id,
            filename: request.filename.clone(),
            total: request.total_chunks,
        });

        if self.fail_merge {
            return Err(TransportError::Status {
                status: 500,
                body: r#"{"error":"Merge failed"}"#.into(),
            });
        }

        Ok(UploadedChunkResult(json!({
            "message": "File merged successfully",
            "filename": format!("tester/{}_{}", request.session_id, request.filename),
            "original_filename": request.filename,
        })))
    }

    async fn submit_note(
        &self,
        submission: NoteSubmission,
    ) -> Result<NoteResponse, TransportError> {
        self.calls.lock().unwrap().push(Call::Submit {
            target: submission.target.clone(),
            content: submission.content.clone(),
            group_id: submission.group_id,
            uploaded_chunks: submission.uploaded_chunks.len(),
            images: submission.images.iter().map(|f| f.name().to_string()).collect(),
        });

        if let Some(ref message) = self.reject_note {
            return Err(TransportError::Status {
                status: 400,
                body: json!({ "error": message }).to_string(),
            });
        }

        let id = match submission.target {
            NoteTarget::Create => 1,
            NoteTarget::Update { note_id, .. } => note_id,
        };
        Ok(NoteResponse {
            id: Some(id),
            message: Some("saved".into()),
            extra: Default::default(),
        })
    }
}
