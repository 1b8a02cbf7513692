//! services/wizard/src/adapters/rest.rs
//!
//! This module contains the HTTP adapter for the evaluation backend.
//! It implements the `EvaluationPipeline` port against the REST surface served
//! under the configured API base URL.

use crate::web::protocol::{
    port_error_from_code, DocumentPayload, ErrorBody, EvaluationResultPayload,
    JobDescriptionPayload, ProcessingStatusPayload, StartProcessingRequest,
    StartProcessingResponse, UploadMetadataPayload,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use skilllens_core::domain::{Document, EvaluationResult, JobDescription};
use skilllens_core::ports::{
    BatchId, EvaluationPipeline, PortError, PortResult, ProcessingStatus, Report, ReportFormat,
    UploadMetadata,
};
use tracing::{debug, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `EvaluationPipeline` port over HTTP.
#[derive(Clone)]
pub struct RestPipelineClient {
    client: Client,
    base_url: String,
}

impl RestPipelineClient {
    /// Creates a new `RestPipelineClient` for a base URL such as `http://host/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and turns any non-success status into a `PortError`.
    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(envelope) => port_error_from_code(&envelope.error.code, envelope.error.message),
            Err(_) => error_from_status(status, body),
        };
        warn!("Pipeline request failed with status {}: {}", status, err);
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response body: {}", e)))
    }
}

/// Fallback mapping for error responses without the JSON envelope.
fn error_from_status(status: StatusCode, body: String) -> PortError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    };
    match status.as_u16() {
        400 | 413 | 415 | 422 => PortError::Validation(message),
        404 => PortError::NotFound(message),
        409 => PortError::Conflict(message),
        425 => PortError::NotReady(message),
        507 => PortError::Storage(message),
        _ => PortError::Unexpected(message),
    }
}

//=========================================================================================
// `EvaluationPipeline` Trait Implementation
//=========================================================================================

#[async_trait]
impl EvaluationPipeline for RestPipelineClient {
    async fn save_job_description(&self, job: &JobDescription) -> PortResult<JobDescription> {
        debug!("PUT job description {}", job.id);
        let request = self
            .client
            .put(self.url(&format!("/job-description/{}", job.id)))
            .json(&JobDescriptionPayload::from(job));
        let saved: JobDescriptionPayload = self.send_json(request).await?;
        Ok(saved.to_domain())
    }

    async fn get_job_description(&self, id: Uuid) -> PortResult<JobDescription> {
        let request = self.client.get(self.url(&format!("/job-description/{}", id)));
        let job: JobDescriptionPayload = self.send_json(request).await?;
        Ok(job.to_domain())
    }

    async fn upload_document(
        &self,
        file_bytes: Bytes,
        original_name: &str,
        metadata: &UploadMetadata,
    ) -> PortResult<Document> {
        debug!(
            "Uploading '{}' ({} bytes) as document {}",
            original_name,
            file_bytes.len(),
            metadata.document_id
        );
        let metadata_json = serde_json::to_string(&UploadMetadataPayload {
            document_id: metadata.document_id,
            job_description_id: metadata.job_description_id,
        })
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let file_part = multipart::Part::bytes(file_bytes.to_vec())
            .file_name(original_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("metadata", metadata_json);

        let request = self
            .client
            .post(self.url("/documents/upload"))
            .multipart(form);
        let stored: DocumentPayload = self.send_json(request).await?;
        Ok(stored.to_domain())
    }

    async fn list_documents(&self) -> PortResult<Vec<Document>> {
        let request = self.client.get(self.url("/documents"));
        let documents: Vec<DocumentPayload> = self.send_json(request).await?;
        Ok(documents.into_iter().map(DocumentPayload::to_domain).collect())
    }

    async fn get_document(&self, id: Uuid) -> PortResult<Document> {
        let request = self.client.get(self.url(&format!("/documents/{}", id)));
        let document: DocumentPayload = self.send_json(request).await?;
        Ok(document.to_domain())
    }

    async fn delete_document(&self, id: Uuid) -> PortResult<()> {
        let request = self.client.delete(self.url(&format!("/documents/{}", id)));
        self.send(request).await?;
        Ok(())
    }

    async fn start_processing(
        &self,
        job_description_id: Option<Uuid>,
        document_ids: &[Uuid],
    ) -> PortResult<BatchId> {
        let request = self
            .client
            .post(self.url("/processing/status/start"))
            .json(&StartProcessingRequest {
                document_ids: document_ids.to_vec(),
                job_description_id,
            });
        let started: StartProcessingResponse = self.send_json(request).await?;
        debug!(
            "Started batch {} for {} documents",
            started.batch_id,
            document_ids.len()
        );
        Ok(started.batch_id)
    }

    async fn get_processing_status(&self, batch_id: BatchId) -> PortResult<ProcessingStatus> {
        let request = self
            .client
            .get(self.url(&format!("/processing/status/{}", batch_id)));
        let status: ProcessingStatusPayload = self.send_json(request).await?;
        Ok(status.to_domain())
    }

    async fn get_evaluation_results(&self, batch_id: BatchId) -> PortResult<Vec<EvaluationResult>> {
        let request = self
            .client
            .get(self.url(&format!("/evaluation/results/{}", batch_id)));
        let results: Vec<EvaluationResultPayload> = self.send_json(request).await?;
        Ok(results
            .into_iter()
            .map(EvaluationResultPayload::to_domain)
            .collect())
    }

    async fn download_evaluation_report(
        &self,
        batch_id: BatchId,
        format: ReportFormat,
    ) -> PortResult<Report> {
        let request = self
            .client
            .get(self.url(&format!("/evaluation/results/{}/report", batch_id)))
            .query(&[("format", format.as_str())]);
        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        Ok(Report {
            format,
            content_type,
            bytes,
        })
    }
}
