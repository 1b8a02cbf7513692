//! services/wizard/src/web/rest.rs
//!
//! Contains the Axum handlers of the reference evaluation backend and the
//! master definition for the OpenAPI specification.

use crate::web::error::ApiError;
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::protocol::{
    DocumentPayload, DocumentStatusPayload, ErrorBody, ErrorDetail, EvaluationResultPayload,
    ExtractedInfoPayload, JobDescriptionPayload, PhasePayload, ProcessingStatusPayload,
    ScoreDetailsPayload, StartProcessingRequest, StartProcessingResponse, UploadMetadataPayload,
};
use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use serde::Deserialize;
use skilllens_core::ports::{ReportFormat, UploadMetadata};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        save_job_description_handler,
        get_job_description_handler,
        upload_document_handler,
        list_documents_handler,
        get_document_handler,
        delete_document_handler,
        start_processing_handler,
        processing_status_handler,
        evaluation_results_handler,
        download_report_handler,
    ),
    components(
        schemas(
            JobDescriptionPayload,
            DocumentPayload,
            DocumentStatusPayload,
            UploadMetadataPayload,
            StartProcessingRequest,
            StartProcessingResponse,
            ProcessingStatusPayload,
            PhasePayload,
            EvaluationResultPayload,
            ScoreDetailsPayload,
            ExtractedInfoPayload,
            ErrorBody,
            ErrorDetail,
        )
    ),
    servers((url = "/api")),
    tags(
        (name = "SkillLens AI", description = "Document processing and candidate evaluation pipeline.")
    )
)]
pub struct ApiDoc;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// `pdf` or `excel`.
    format: String,
}

//=========================================================================================
// Job Description
//=========================================================================================

/// Create or replace a job description.
#[utoipa::path(
    put,
    path = "/job-description/{id}",
    request_body = JobDescriptionPayload,
    params(("id" = Uuid, Path, description = "Job description id")),
    responses(
        (status = 200, description = "Job description saved", body = JobDescriptionPayload),
        (status = 400, description = "Missing fields or mismatched id", body = ErrorBody)
    )
)]
pub async fn save_job_description_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<JobDescriptionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.id != id {
        return Err(ApiError::BadRequest(format!(
            "Body id {} does not match path id {}",
            payload.id, id
        )));
    }
    let saved = app_state
        .pipeline
        .save_job_description(&payload.to_domain())
        .await?;
    Ok(Json(JobDescriptionPayload::from(&saved)))
}

#[utoipa::path(
    get,
    path = "/job-description/{id}",
    params(("id" = Uuid, Path, description = "Job description id")),
    responses(
        (status = 200, body = JobDescriptionPayload),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_job_description_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state.pipeline.get_job_description(id).await?;
    Ok(Json(JobDescriptionPayload::from(&job)))
}

//=========================================================================================
// Documents
//=========================================================================================

/// Upload a CV.
///
/// Accepts a multipart/form-data request with a `file` part and an optional
/// `metadata` part holding `UploadMetadataPayload` as JSON.
#[utoipa::path(
    post,
    path = "/documents/upload",
    request_body(content_type = "multipart/form-data", description = "The file and its JSON metadata."),
    responses(
        (status = 201, description = "Document stored", body = DocumentPayload),
        (status = 400, description = "Unsupported type, oversize or malformed form", body = ErrorBody),
        (status = 409, description = "Document id already in use", body = ErrorBody),
        (status = 507, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn upload_document_handler(
    State(app_state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Bytes)> = None;
    let mut metadata: Option<UploadMetadataPayload> = None;

    // Oversized bodies surface here as 413 rejections.
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("untitled").to_string();
                let data = field.bytes().await?;
                file = Some((name, data));
            }
            Some("metadata") => {
                let text = field.text().await?;
                metadata = Some(serde_json::from_str(&text).map_err(|e| {
                    ApiError::BadRequest(format!("Metadata is not valid JSON: {}", e))
                })?);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (name, data) =
        file.ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    let metadata = match metadata {
        Some(m) => UploadMetadata {
            document_id: m.document_id,
            job_description_id: m.job_description_id,
        },
        None => UploadMetadata {
            document_id: Uuid::new_v4(),
            job_description_id: None,
        },
    };

    let document = app_state
        .pipeline
        .upload_document(data, &name, &metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(DocumentPayload::from(&document))))
}

#[utoipa::path(
    get,
    path = "/documents",
    responses((status = 200, body = Vec<DocumentPayload>))
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = app_state.pipeline.list_documents().await?;
    Ok(Json(
        documents
            .iter()
            .map(DocumentPayload::from)
            .collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, body = DocumentPayload),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = app_state.pipeline.get_document(id).await?;
    Ok(Json(DocumentPayload::from(&document)))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Document is being processed", body = ErrorBody)
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state.pipeline.delete_document(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Processing
//=========================================================================================

#[utoipa::path(
    post,
    path = "/processing/status/start",
    request_body = StartProcessingRequest,
    responses(
        (status = 202, description = "Batch started", body = StartProcessingResponse),
        (status = 404, description = "Unknown job description or document", body = ErrorBody),
        (status = 409, description = "A document is already being processed", body = ErrorBody)
    )
)]
pub async fn start_processing_handler(
    State(app_state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<StartProcessingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let batch_id = app_state
        .pipeline
        .start_processing(request.job_description_id, &request.document_ids)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartProcessingResponse { batch_id }),
    ))
}

#[utoipa::path(
    get,
    path = "/processing/status/{batch_id}",
    params(("batch_id" = Uuid, Path, description = "Batch id")),
    responses(
        (status = 200, body = ProcessingStatusPayload),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn processing_status_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(batch_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = app_state.pipeline.get_processing_status(batch_id).await?;
    Ok(Json(ProcessingStatusPayload::new(batch_id, status)))
}

//=========================================================================================
// Evaluation
//=========================================================================================

#[utoipa::path(
    get,
    path = "/evaluation/results/{batch_id}",
    params(("batch_id" = Uuid, Path, description = "Batch id")),
    responses(
        (status = 200, body = Vec<EvaluationResultPayload>),
        (status = 404, body = ErrorBody),
        (status = 425, description = "Batch still processing", body = ErrorBody)
    )
)]
pub async fn evaluation_results_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(batch_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let results = app_state.pipeline.get_evaluation_results(batch_id).await?;
    Ok(Json(
        results
            .iter()
            .map(EvaluationResultPayload::from)
            .collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    get,
    path = "/evaluation/results/{batch_id}/report",
    params(
        ("batch_id" = Uuid, Path, description = "Batch id"),
        ReportQuery
    ),
    responses(
        (status = 200, description = "Rendered report; `application/pdf` or `text/csv`"),
        (status = 400, description = "Unknown format", body = ErrorBody),
        (status = 425, description = "Batch still processing", body = ErrorBody)
    )
)]
pub async fn download_report_handler(
    State(app_state): State<Arc<AppState>>,
    ApiPath(batch_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format: ReportFormat = query.format.parse().map_err(ApiError::BadRequest)?;
    let report = app_state
        .pipeline
        .download_evaluation_report(batch_id, format)
        .await?;
    let extension = match format {
        ReportFormat::Pdf => "pdf",
        ReportFormat::Excel => "csv",
    };
    info!("Serving {} report for batch {}", format, batch_id);
    Ok((
        [
            (header::CONTENT_TYPE, report.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"evaluation-{}.{}\"",
                    batch_id, extension
                ),
            ),
        ],
        report.bytes,
    ))
}

/// Serves the OpenAPI document.
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
