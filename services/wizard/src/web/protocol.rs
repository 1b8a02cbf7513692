//! services/wizard/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged between the wizard and the evaluation
//! backend. Field names are camelCase on the wire; every payload converts to
//! and from the pure domain types in `skilllens_core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skilllens_core::domain::{
    CandidateInfo, Document, DocumentStatus, EvaluationResult, JobDescription, ScoreBreakdown,
};
use skilllens_core::ports::{PortError, ProcessingPhase, ProcessingStatus};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Job Description
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptionPayload {
    pub id: Uuid,
    pub public_description: String,
    pub special_conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&JobDescription> for JobDescriptionPayload {
    fn from(job: &JobDescription) -> Self {
        Self {
            id: job.id,
            public_description: job.public_description.clone(),
            special_conditions: job.special_conditions.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl JobDescriptionPayload {
    pub fn to_domain(self) -> JobDescription {
        JobDescription {
            id: self.id,
            public_description: self.public_description,
            special_conditions: self.special_conditions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatusPayload {
    Uploading,
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl From<DocumentStatus> for DocumentStatusPayload {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Uploading => DocumentStatusPayload::Uploading,
            DocumentStatus::Uploaded => DocumentStatusPayload::Uploaded,
            DocumentStatus::Processing => DocumentStatusPayload::Processing,
            DocumentStatus::Processed => DocumentStatusPayload::Processed,
            DocumentStatus::Error => DocumentStatusPayload::Error,
        }
    }
}

impl From<DocumentStatusPayload> for DocumentStatus {
    fn from(status: DocumentStatusPayload) -> Self {
        match status {
            DocumentStatusPayload::Uploading => DocumentStatus::Uploading,
            DocumentStatusPayload::Uploaded => DocumentStatus::Uploaded,
            DocumentStatusPayload::Processing => DocumentStatus::Processing,
            DocumentStatusPayload::Processed => DocumentStatus::Processed,
            DocumentStatusPayload::Error => DocumentStatus::Error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatusPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_progress: Option<f32>,
    pub path: String,
}

impl From<&Document> for DocumentPayload {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            original_name: doc.original_name.clone(),
            size: doc.size,
            uploaded_at: doc.uploaded_at,
            status: doc.status.into(),
            processing_progress: doc.processing_progress,
            path: doc.path.clone(),
        }
    }
}

impl DocumentPayload {
    pub fn to_domain(self) -> Document {
        Document {
            id: self.id,
            filename: self.filename,
            original_name: self.original_name,
            size: self.size,
            uploaded_at: self.uploaded_at,
            status: self.status.into(),
            processing_progress: self.processing_progress,
            path: self.path,
        }
    }
}

/// The JSON `metadata` part of a multipart upload.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadataPayload {
    pub document_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description_id: Option<Uuid>,
}

//=========================================================================================
// Processing
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessingRequest {
    pub document_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessingResponse {
    pub batch_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PhasePayload {
    Analyzing,
    Comparing,
    Evaluating,
    Completed,
}

impl From<ProcessingPhase> for PhasePayload {
    fn from(phase: ProcessingPhase) -> Self {
        match phase {
            ProcessingPhase::Analyzing => PhasePayload::Analyzing,
            ProcessingPhase::Comparing => PhasePayload::Comparing,
            ProcessingPhase::Evaluating => PhasePayload::Evaluating,
            ProcessingPhase::Completed => PhasePayload::Completed,
        }
    }
}

impl From<PhasePayload> for ProcessingPhase {
    fn from(phase: PhasePayload) -> Self {
        match phase {
            PhasePayload::Analyzing => ProcessingPhase::Analyzing,
            PhasePayload::Comparing => ProcessingPhase::Comparing,
            PhasePayload::Evaluating => ProcessingPhase::Evaluating,
            PhasePayload::Completed => ProcessingPhase::Completed,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatusPayload {
    pub batch_id: Uuid,
    pub progress_pct: f32,
    pub phase: PhasePayload,
    pub is_complete: bool,
}

impl ProcessingStatusPayload {
    pub fn new(batch_id: Uuid, status: ProcessingStatus) -> Self {
        Self {
            batch_id,
            progress_pct: status.progress_pct,
            phase: status.phase.into(),
            is_complete: status.is_complete,
        }
    }

    pub fn to_domain(self) -> ProcessingStatus {
        ProcessingStatus {
            progress_pct: self.progress_pct,
            phase: self.phase.into(),
            is_complete: self.is_complete,
        }
    }
}

//=========================================================================================
// Evaluation Results
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDetailsPayload {
    pub experience: f32,
    pub skills: f32,
    pub education: f32,
    pub compatibility: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInfoPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub experience: Vec<String>,
    pub skills: Vec<String>,
    pub education: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResultPayload {
    pub candidate_id: String,
    pub candidate_name: String,
    pub document_id: Uuid,
    pub score: f32,
    pub details: ScoreDetailsPayload,
    pub extracted_info: ExtractedInfoPayload,
}

impl From<&EvaluationResult> for EvaluationResultPayload {
    fn from(result: &EvaluationResult) -> Self {
        let info = &result.extracted_info;
        Self {
            candidate_id: result.candidate_id.clone(),
            candidate_name: result.candidate_name.clone(),
            document_id: result.document_id,
            score: result.score,
            details: ScoreDetailsPayload {
                experience: result.details.experience,
                skills: result.details.skills,
                education: result.details.education,
                compatibility: result.details.compatibility,
            },
            extracted_info: ExtractedInfoPayload {
                name: info.name.clone(),
                email: info.email.clone(),
                phone: info.phone.clone(),
                experience: info.experience.clone(),
                skills: info.skills.clone(),
                education: info.education.clone(),
            },
        }
    }
}

impl EvaluationResultPayload {
    pub fn to_domain(self) -> EvaluationResult {
        EvaluationResult {
            candidate_id: self.candidate_id,
            candidate_name: self.candidate_name,
            document_id: self.document_id,
            score: self.score,
            details: ScoreBreakdown {
                experience: self.details.experience,
                skills: self.details.skills,
                education: self.details.education,
                compatibility: self.details.compatibility,
            },
            extracted_info: CandidateInfo {
                name: self.extracted_info.name,
                email: self.extracted_info.email,
                phone: self.extracted_info.phone,
                experience: self.extracted_info.experience,
                skills: self.extracted_info.skills,
                education: self.extracted_info.education,
            },
        }
    }
}

//=========================================================================================
// Errors
//=========================================================================================

/// Error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const NOT_READY: &str = "NOT_READY";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// The wire code for a pipeline error.
pub fn error_code(err: &PortError) -> &'static str {
    match err {
        PortError::Validation(_) => VALIDATION_ERROR,
        PortError::Storage(_) => STORAGE_ERROR,
        PortError::NotFound(_) => NOT_FOUND,
        PortError::Conflict(_) => CONFLICT,
        PortError::NotReady(_) => NOT_READY,
        PortError::Network(_) | PortError::Timeout(_) | PortError::Unexpected(_) => {
            INTERNAL_ERROR
        }
    }
}

/// Rebuilds a pipeline error from a wire code.
pub fn port_error_from_code(code: &str, message: String) -> PortError {
    match code {
        VALIDATION_ERROR => PortError::Validation(message),
        STORAGE_ERROR => PortError::Storage(message),
        NOT_FOUND => PortError::NotFound(message),
        CONFLICT => PortError::Conflict(message),
        NOT_READY => PortError::NotReady(message),
        _ => PortError::Unexpected(message),
    }
}
