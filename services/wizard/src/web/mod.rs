pub mod error;
pub mod extract;
pub mod protocol;
pub mod rest;
pub mod state;

use crate::web::rest::{
    delete_document_handler, download_report_handler, evaluation_results_handler,
    get_document_handler, get_job_description_handler, list_documents_handler, openapi_handler,
    processing_status_handler, save_job_description_handler, start_processing_handler,
    upload_document_handler,
};
use crate::web::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method, Uri,
    },
    routing::{get, post},
    Router,
};
use skilllens_core::ports::PortError;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub use error::ApiError;
pub use rest::ApiDoc;

/// Room for multipart framing and the metadata part on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

async fn unknown_route(uri: Uri) -> ApiError {
    PortError::NotFound(format!("No route for {}", uri.path())).into()
}

/// Builds the reference backend: the pipeline routes under `/api` and the
/// OpenAPI document at `/api-docs/openapi.json`.
pub fn router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_file_size as usize + MULTIPART_OVERHEAD;

    let api_router = Router::new()
        .route(
            "/job-description/{id}",
            get(get_job_description_handler).put(save_job_description_handler),
        )
        .route("/documents", get(list_documents_handler))
        .route("/documents/upload", post(upload_document_handler))
        .route(
            "/documents/{id}",
            get(get_document_handler).delete(delete_document_handler),
        )
        .route("/processing/status/start", post(start_processing_handler))
        .route(
            "/processing/status/{batch_id}",
            get(processing_status_handler),
        )
        .route(
            "/evaluation/results/{batch_id}",
            get(evaluation_results_handler),
        )
        .route(
            "/evaluation/results/{batch_id}/report",
            get(download_report_handler),
        )
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    Router::new()
        .nest("/api", api_router)
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(cors)
}
