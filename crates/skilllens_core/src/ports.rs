//! crates/skilllens_core/src/ports.rs
//!
//! Defines the service contracts (traits) the wizard depends on.
//! The evaluation pipeline, the candidate scorer and document storage all live
//! outside the core; these traits are the boundary they must honour.

use crate::domain::{Document, EvaluationResult, JobDescription};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every pipeline operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not ready: {0}")]
    NotReady(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Pipeline Contract Types
//=========================================================================================

/// Identifies one processing run.
pub type BatchId = Uuid;

/// Extra data sent alongside an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    /// Client-assigned id the backend should keep for the stored document.
    pub document_id: Uuid,
    pub job_description_id: Option<Uuid>,
}

/// Coarse stage of a running batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPhase {
    Analyzing,
    Comparing,
    Evaluating,
    Completed,
}

impl ProcessingPhase {
    /// Maps progress onto four equal quarters. The last quarter already reads
    /// `completed`; a finished batch always does.
    pub fn for_progress(progress_pct: f32, is_complete: bool) -> Self {
        if is_complete || progress_pct >= 75.0 {
            ProcessingPhase::Completed
        } else if progress_pct < 25.0 {
            ProcessingPhase::Analyzing
        } else if progress_pct < 50.0 {
            ProcessingPhase::Comparing
        } else {
            ProcessingPhase::Evaluating
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingPhase::Analyzing => "analyzing",
            ProcessingPhase::Comparing => "comparing",
            ProcessingPhase::Evaluating => "evaluating",
            ProcessingPhase::Completed => "completed",
        }
    }
}

impl FromStr for ProcessingPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyzing" => Ok(ProcessingPhase::Analyzing),
            "comparing" => Ok(ProcessingPhase::Comparing),
            "evaluating" => Ok(ProcessingPhase::Evaluating),
            "completed" => Ok(ProcessingPhase::Completed),
            other => Err(format!("unknown processing phase '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingStatus {
    pub progress_pct: f32,
    pub phase: ProcessingPhase,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(ReportFormat::Pdf),
            "excel" => Ok(ReportFormat::Excel),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// A rendered report artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub format: ReportFormat,
    pub content_type: String,
    pub bytes: Bytes,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The document-processing and evaluation backend.
///
/// Ordering: `start_processing` only for documents reported `uploaded`;
/// `get_evaluation_results` only once `get_processing_status` reports completion.
#[async_trait]
pub trait EvaluationPipeline: Send + Sync {
    // --- Job Description ---
    async fn save_job_description(&self, job: &JobDescription) -> PortResult<JobDescription>;

    async fn get_job_description(&self, id: Uuid) -> PortResult<JobDescription>;

    // --- Documents ---
    /// Stores a file and returns its descriptor with status `uploaded`.
    async fn upload_document(
        &self,
        file_bytes: Bytes,
        original_name: &str,
        metadata: &UploadMetadata,
    ) -> PortResult<Document>;

    async fn list_documents(&self) -> PortResult<Vec<Document>>;

    async fn get_document(&self, id: Uuid) -> PortResult<Document>;

    async fn delete_document(&self, id: Uuid) -> PortResult<()>;

    // --- Processing ---
    /// Starts a batch. Without a job description id the backend evaluates
    /// against its most recently saved job description.
    async fn start_processing(
        &self,
        job_description_id: Option<Uuid>,
        document_ids: &[Uuid],
    ) -> PortResult<BatchId>;

    async fn get_processing_status(&self, batch_id: BatchId) -> PortResult<ProcessingStatus>;

    // --- Evaluation ---
    async fn get_evaluation_results(&self, batch_id: BatchId) -> PortResult<Vec<EvaluationResult>>;

    async fn download_evaluation_report(
        &self,
        batch_id: BatchId,
        format: ReportFormat,
    ) -> PortResult<Report>;
}

/// Scores one CV against a job description. The scoring method is external
/// and swappable; callers only rely on the 0–5 range of every score.
#[async_trait]
pub trait CandidateScorer: Send + Sync {
    async fn evaluate(
        &self,
        job: &JobDescription,
        document: &Document,
        contents: &[u8],
        position: usize,
    ) -> PortResult<EvaluationResult>;
}

/// Blob storage for uploaded files, addressed by the document's storage path.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn put(&self, path: &str, contents: Bytes) -> PortResult<()>;

    async fn get(&self, path: &str) -> PortResult<Bytes>;

    async fn delete(&self, path: &str) -> PortResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_progress_quarters() {
        assert_eq!(ProcessingPhase::for_progress(0.0, false), ProcessingPhase::Analyzing);
        assert_eq!(ProcessingPhase::for_progress(30.0, false), ProcessingPhase::Comparing);
        assert_eq!(ProcessingPhase::for_progress(50.0, false), ProcessingPhase::Evaluating);
        assert_eq!(ProcessingPhase::for_progress(74.9, false), ProcessingPhase::Evaluating);
        assert_eq!(ProcessingPhase::for_progress(75.0, false), ProcessingPhase::Completed);
        assert_eq!(ProcessingPhase::for_progress(10.0, true), ProcessingPhase::Completed);
        assert_eq!(ProcessingPhase::for_progress(100.0, true), ProcessingPhase::Completed);
    }

    #[test]
    fn report_format_parses_query_values() {
        assert_eq!("excel".parse::<ReportFormat>(), Ok(ReportFormat::Excel));
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }
}
