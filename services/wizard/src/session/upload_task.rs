//! services/wizard/src/session/upload_task.rs
//!
//! The worker that sends one accepted file to the pipeline and reconciles the
//! tracked document with whatever the backend stored.

use bytes::Bytes;
use skilllens_core::domain::Document;
use skilllens_core::ports::{EvaluationPipeline, PortError, UploadMetadata};
use skilllens_core::steps::StepController;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How one upload ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded(Uuid),
    Failed { id: Uuid, error: PortError },
    /// The wizard was reset or the document removed while the request was in flight.
    Discarded(Uuid),
}

/// Uploads `contents` for a document already tracked as `uploading`.
///
/// The store is only touched while holding the controller lock and after
/// checking the token, so a reset that happened meanwhile is never undone.
pub async fn upload_document(
    controller: Arc<Mutex<StepController>>,
    pipeline: Arc<dyn EvaluationPipeline>,
    document: Document,
    contents: Bytes,
    job_description_id: Option<Uuid>,
    cancellation_token: CancellationToken,
) -> UploadOutcome {
    let id = document.id;
    let metadata = UploadMetadata {
        document_id: id,
        job_description_id,
    };
    debug!("Upload of '{}' started", document.original_name);

    let result = tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Upload of {} cancelled", id);
            return UploadOutcome::Discarded(id);
        }
        result = pipeline.upload_document(contents, &document.original_name, &metadata) => result,
    };

    let mut controller = controller.lock().await;
    if cancellation_token.is_cancelled() || controller.state().document(id).is_none() {
        drop(controller);
        if let Ok(stored) = &result {
            if let Err(e) = pipeline.delete_document(stored.id).await {
                warn!("Could not delete orphaned upload {}: {}", stored.id, e);
            }
        }
        return UploadOutcome::Discarded(id);
    }

    match result {
        // From here on the document is tracked under the id the backend assigned.
        Ok(stored) => match controller.mark_uploaded(id, &stored) {
            Ok(()) => {
                info!("Uploaded '{}' as {}", document.original_name, stored.filename);
                UploadOutcome::Uploaded(stored.id)
            }
            Err(e) => {
                error!("Could not record upload of {}: {}", id, e);
                if let Err(step_err) = controller.mark_failed(id) {
                    error!("Could not mark {} as failed: {}", id, step_err);
                }
                UploadOutcome::Failed {
                    id,
                    error: PortError::Conflict(e.to_string()),
                }
            }
        },
        Err(e) => {
            error!("Upload of '{}' failed: {}", document.original_name, e);
            if let Err(step_err) = controller.mark_failed(id) {
                error!("Could not mark {} as failed: {}", id, step_err);
            }
            UploadOutcome::Failed { id, error: e }
        }
    }
}
