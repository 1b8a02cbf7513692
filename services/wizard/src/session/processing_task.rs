//! services/wizard/src/session/processing_task.rs
//!
//! The polling worker for one processing batch. It asks the pipeline for the
//! batch status at a fixed interval, mirrors progress into the wizard, and on
//! completion fetches the results exactly once.

use skilllens_core::ports::{BatchId, EvaluationPipeline, PortError};
use skilllens_core::steps::StepController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a polling run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed { results: usize },
    Failed { reason: String },
    TimedOut,
    /// The user left the processing step or reset the wizard.
    Cancelled,
}

pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Polls `batch_id` until it completes, fails, times out or is cancelled.
/// The timeout covers the whole run, results fetch included.
///
/// Every dispatch happens under the controller lock after re-checking the
/// token; whoever cancels must hold the same lock.
pub async fn poll_batch(
    controller: Arc<Mutex<StepController>>,
    pipeline: Arc<dyn EvaluationPipeline>,
    batch_id: BatchId,
    settings: PollSettings,
    cancellation_token: CancellationToken,
) -> BatchOutcome {
    info!("Polling batch {}", batch_id);
    let deadline = Instant::now() + settings.timeout;

    loop {
        let status = tokio::select! {
            _ = cancellation_token.cancelled() => return cancelled(batch_id),
            _ = sleep_until(deadline) => {
                return fail(&controller, &cancellation_token, batch_id, PortError::Timeout(settings.timeout)).await;
            }
            status = pipeline.get_processing_status(batch_id) => status,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => return fail(&controller, &cancellation_token, batch_id, e).await,
        };
        debug!(
            "Batch {} at {:.0}% ({})",
            batch_id,
            status.progress_pct,
            status.phase.as_str()
        );

        if status.is_complete {
            break;
        }

        {
            let mut controller = controller.lock().await;
            if cancellation_token.is_cancelled() {
                return cancelled(batch_id);
            }
            if let Err(e) = controller.record_progress(status.progress_pct) {
                warn!("Progress for batch {} dropped: {}", batch_id, e);
            }
        }

        tokio::select! {
            _ = cancellation_token.cancelled() => return cancelled(batch_id),
            _ = sleep_until(deadline) => {
                return fail(&controller, &cancellation_token, batch_id, PortError::Timeout(settings.timeout)).await;
            }
            _ = sleep(settings.interval) => {}
        }
    }

    let results = tokio::select! {
        _ = cancellation_token.cancelled() => return cancelled(batch_id),
        _ = sleep_until(deadline) => {
            return fail(&controller, &cancellation_token, batch_id, PortError::Timeout(settings.timeout)).await;
        }
        results = pipeline.get_evaluation_results(batch_id) => results,
    };
    let results = match results {
        Ok(results) => results,
        Err(e) => return fail(&controller, &cancellation_token, batch_id, e).await,
    };

    let mut guard = controller.lock().await;
    if cancellation_token.is_cancelled() {
        return cancelled(batch_id);
    }
    let count = results.len();
    match guard.complete_processing(results) {
        Ok(()) => {
            info!("Batch {} completed with {} results", batch_id, count);
            BatchOutcome::Completed { results: count }
        }
        Err(e) => {
            error!("Batch {} returned unusable results: {}", batch_id, e);
            if let Err(step_err) = guard.fail_processing() {
                error!("Could not mark batch {} failed: {}", batch_id, step_err);
            }
            BatchOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn cancelled(batch_id: BatchId) -> BatchOutcome {
    info!("Polling for batch {} cancelled", batch_id);
    BatchOutcome::Cancelled
}

async fn fail(
    controller: &Mutex<StepController>,
    cancellation_token: &CancellationToken,
    batch_id: BatchId,
    err: PortError,
) -> BatchOutcome {
    let mut controller = controller.lock().await;
    if cancellation_token.is_cancelled() {
        return cancelled(batch_id);
    }
    error!("Batch {} failed: {}", batch_id, err);
    match controller.fail_processing() {
        Ok(failed) => warn!("Marked {} documents as failed", failed.len()),
        Err(e) => error!("Could not mark batch {} failed: {}", batch_id, e),
    }
    match err {
        PortError::Timeout(_) => BatchOutcome::TimedOut,
        other => BatchOutcome::Failed {
            reason: other.to_string(),
        },
    }
}
