//! HTTP transport: the only module that talks to the notes server.
//!
//! The pipeline depends on the [`UploadTransport`] trait, not on reqwest.
//! [`HttpTransport`] implements it against the real endpoints; tests and
//! embedders can supply their own implementation through
//! [`crate::config::UploadConfigBuilder::transport`].
//!
//! ## Endpoints
//!
//! | Request                | Body                                               |
//! |------------------------|----------------------------------------------------|
//! | `POST /api/upload/chunk` | multipart `file`, `dzuuid`, `dzchunkindex`, `dztotalchunkcount` |
//! | `POST /api/upload/merge` | JSON `{dzuuid, filename, dztotalchunkcount}`     |
//! | `POST /api/notes`        | multipart note fields + `uploaded_chunks` + `images` |
//! | `PUT /api/notes/{id}`    | as above + `keep_images`                          |

use crate::config::UploadConfig;
use crate::error::{TransportError, UploadError};
use crate::output::{NoteResponse, NoteSubmission, NoteTarget, UploadedChunkResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// One chunk of a chunked upload session.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub session_id: Uuid,
    /// Zero-based index of this chunk.
    pub index: u32,
    pub total_chunks: u32,
    /// Name the chunk part is sent under; the server ignores it.
    pub file_name: String,
    pub data: Bytes,
}

/// Body of the merge request, using the server's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(rename = "dzuuid")]
    pub session_id: Uuid,
    pub filename: String,
    #[serde(rename = "dztotalchunkcount")]
    pub total_chunks: u32,
}

/// The server operations the upload pipeline needs.
///
/// Implementations must not retry: a failed request is reported as-is and
/// the pipeline decides what to abandon.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Store one chunk. `Ok` only for a 2xx answer.
    async fn upload_chunk(&self, chunk: ChunkRequest) -> Result<(), TransportError>;

    /// Ask the server to reassemble a session's chunks.
    async fn merge_chunks(
        &self,
        request: &MergeRequest,
    ) -> Result<UploadedChunkResult, TransportError>;

    /// Create or update a note.
    async fn submit_note(&self, submission: NoteSubmission) -> Result<NoteResponse, TransportError>;
}

/// reqwest-backed transport for the notes server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a client from the connection settings in `config`.
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            UploadError::InvalidConfig(format!("Invalid server URL '{}': {e}", config.base_url))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(ref cookie) = config.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| UploadError::InvalidConfig(format!("Invalid cookie value: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Network(format!("invalid endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload_chunk(&self, chunk: ChunkRequest) -> Result<(), TransportError> {
        let url = self.endpoint("/api/upload/chunk")?;
        let part = Part::stream(chunk.data).file_name(chunk.file_name);
        let form = Form::new()
            .part("file", part)
            .text("dzuuid", chunk.session_id.to_string())
            .text("dzchunkindex", chunk.index.to_string())
            .text("dztotalchunkcount", chunk.total_chunks.to_string());

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await?;
        debug!("Chunk {}/{} stored", chunk.index + 1, chunk.total_chunks);
        Ok(())
    }

    async fn merge_chunks(
        &self,
        request: &MergeRequest,
    ) -> Result<UploadedChunkResult, TransportError> {
        let url = self.endpoint("/api/upload/merge")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;
        response
            .json::<UploadedChunkResult>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn submit_note(
        &self,
        submission: NoteSubmission,
    ) -> Result<NoteResponse, TransportError> {
        let form = note_form(&submission)?;
        let request = match submission.target {
            NoteTarget::Create => self.client.post(self.endpoint("/api/notes")?),
            NoteTarget::Update { note_id, .. } => self
                .client
                .put(self.endpoint(&format!("/api/notes/{note_id}"))?),
        };

        let response = request.multipart(form).send().await.map_err(network_error)?;
        let response = check_status(response).await?;
        response
            .json::<NoteResponse>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Build the multipart body of a note create/update request.
fn note_form(submission: &NoteSubmission) -> Result<Form, TransportError> {
    let uploaded = serde_json::to_string(&submission.uploaded_chunks)
        .map_err(|e| TransportError::Decode(e.to_string()))?;

    let mut form = Form::new()
        .text("content", submission.content.clone())
        .text("date", submission.date.clone())
        .text("group_id", submission.group_id.to_string());

    if let NoteTarget::Update { ref keep_images, .. } = submission.target {
        let keep = serde_json::to_string(keep_images)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        form = form.text("keep_images", keep);
    }

    form = form.text("uploaded_chunks", uploaded);

    for file in &submission.images {
        let part = Part::stream(file.bytes().clone())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| {
                TransportError::Decode(format!("bad media type '{}': {e}", file.mime_type()))
            })?;
        form = form.part("images", part);
    }

    Ok(form)
}

fn network_error(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

/// Turn any non-2xx answer into [`TransportError::Status`], keeping the body.
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Pick the transport for a run: the injected one, else HTTP to `base_url`.
pub fn resolve_transport(config: &UploadConfig) -> Result<Arc<dyn UploadTransport>, UploadError> {
    if let Some(ref transport) = config.transport {
        return Ok(Arc::clone(transport));
    }
    Ok(Arc::new(HttpTransport::new(config)?))
}
