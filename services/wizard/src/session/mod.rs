//! services/wizard/src/session/mod.rs
//!
//! One wizard session: the step controller behind a lock, the pipeline it
//! talks to, and the background tasks (uploads, status polling) that feed
//! results back into the store.

pub mod processing_task;
pub mod upload_task;

use crate::config::{Config, Language, Theme};
use crate::error::WizardError;
use bytes::Bytes;
use futures::future::join_all;
use processing_task::{poll_batch, BatchOutcome, PollSettings};
use skilllens_core::domain::{
    Document, DocumentStatus, InfoPage, JobDescription, WizardState, WizardStep,
};
use skilllens_core::ports::{BatchId, EvaluationPipeline, Report, ReportFormat};
use skilllens_core::steps::{StepController, StepError};
use skilllens_core::validation::{UploadPolicy, ValidationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use upload_task::{upload_document, UploadOutcome};
use uuid::Uuid;

/// Session-level knobs, usually taken from `Config`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub policy: UploadPolicy,
    pub poll_interval: Duration,
    pub processing_timeout: Duration,
    pub language: Language,
    pub theme: Theme,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.upload_policy(),
            poll_interval: config.poll_interval,
            processing_timeout: config.processing_timeout,
            language: config.default_language,
            theme: config.default_theme,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            policy: UploadPolicy::default(),
            poll_interval: Duration::from_millis(1000),
            processing_timeout: Duration::from_secs(300),
            language: Language::Es,
            theme: Theme::Light,
        }
    }
}

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: ValidationError,
}

/// Which picked files became tracked documents and which were refused up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    /// Local ids. A finished upload may re-key its document to the id the
    /// backend assigned; see `UploadOutcome::Uploaded`.
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<RejectedFile>,
}

struct ProcessingRun {
    token: CancellationToken,
    handle: Option<JoinHandle<BatchOutcome>>,
}

/// Background work owned by the session. Always locked after the controller.
struct Runs {
    /// Parent of every upload token; replaced on reset.
    uploads_token: CancellationToken,
    uploads: Vec<JoinHandle<UploadOutcome>>,
    processing: Option<ProcessingRun>,
    last_batch: Option<BatchId>,
}

impl Runs {
    fn new() -> Self {
        Self {
            uploads_token: CancellationToken::new(),
            uploads: Vec::new(),
            processing: None,
            last_batch: None,
        }
    }

    fn cancel_processing(&mut self) {
        if let Some(run) = &self.processing {
            run.token.cancel();
        }
    }
}

pub struct WizardSession {
    controller: Arc<Mutex<StepController>>,
    pipeline: Arc<dyn EvaluationPipeline>,
    settings: Mutex<SessionSettings>,
    runs: Mutex<Runs>,
}

impl WizardSession {
    pub fn new(pipeline: Arc<dyn EvaluationPipeline>, settings: SessionSettings) -> Self {
        Self {
            controller: Arc::new(Mutex::new(StepController::new())),
            pipeline,
            settings: Mutex::new(settings),
            runs: Mutex::new(Runs::new()),
        }
    }

    /// A copy of the current wizard state.
    pub async fn snapshot(&self) -> WizardState {
        self.controller.lock().await.state().clone()
    }

    pub async fn preferences(&self) -> (Language, Theme) {
        let settings = self.settings.lock().await;
        (settings.language, settings.theme)
    }

    pub async fn set_language(&self, language: Language) {
        self.settings.lock().await.language = language;
    }

    pub async fn set_theme(&self, theme: Theme) {
        self.settings.lock().await.theme = theme;
    }

    // --- Navigation ---

    pub async fn start_process(&self) -> Result<(), WizardError> {
        let mut controller = self.controller.lock().await;
        self.leave_processing(&controller).await;
        controller.start_process()?;
        Ok(())
    }

    /// Shows the home view. A running batch stops being polled.
    pub async fn go_home(&self) -> Result<(), WizardError> {
        let mut controller = self.controller.lock().await;
        self.leave_processing(&controller).await;
        controller.go_home()?;
        Ok(())
    }

    pub async fn open_page(&self, page: InfoPage) -> Result<(), WizardError> {
        let mut controller = self.controller.lock().await;
        self.leave_processing(&controller).await;
        controller.open_page(page)?;
        Ok(())
    }

    /// Jumps to a step. Leaving the processing step stops its polling.
    pub async fn go_to(&self, target: WizardStep) -> Result<(), WizardError> {
        let mut controller = self.controller.lock().await;
        if !controller.can_enter(target) {
            return Err(StepError::Unreachable {
                target,
                current: controller.current_step(),
            }
            .into());
        }
        if target != WizardStep::Processing {
            self.leave_processing(&controller).await;
        }
        controller.go_to(target)?;
        Ok(())
    }

    pub async fn back(&self) -> Result<WizardStep, WizardError> {
        let mut controller = self.controller.lock().await;
        self.leave_processing(&controller).await;
        Ok(controller.back()?)
    }

    /// Cancels every background task and clears the wizard.
    pub async fn reset(&self) -> Result<(), WizardError> {
        let mut controller = self.controller.lock().await;
        {
            let mut runs = self.runs.lock().await;
            runs.cancel_processing();
            runs.uploads_token.cancel();
            runs.uploads_token = CancellationToken::new();
            runs.last_batch = None;
        }
        controller.reset()?;
        info!("Wizard reset");
        Ok(())
    }

    async fn leave_processing(&self, controller: &StepController) {
        if controller.state().is_processing {
            info!("Leaving the processing step; polling stops");
            self.runs.lock().await.cancel_processing();
        }
    }

    // --- Step 0: job description ---

    /// Validates the form, persists it remotely and advances to the upload step.
    pub async fn save_job_description(
        &self,
        public_description: &str,
        special_conditions: &str,
    ) -> Result<JobDescription, WizardError> {
        let draft = self
            .controller
            .lock()
            .await
            .prepare_job_description(public_description, special_conditions)?;
        let saved = self.pipeline.save_job_description(&draft).await?;
        self.controller
            .lock()
            .await
            .commit_job_description(saved.clone())?;
        info!("Job description {} saved", saved.id);
        Ok(saved)
    }

    /// Fetches a stored job description and makes it the current one.
    pub async fn load_job_description(&self, id: Uuid) -> Result<JobDescription, WizardError> {
        let job = self.pipeline.get_job_description(id).await?;
        self.controller
            .lock()
            .await
            .commit_job_description(job.clone())?;
        Ok(job)
    }

    // --- Step 1: documents ---

    /// Validates each file, tracks the valid ones as `uploading` and uploads
    /// them concurrently. Invalid files are reported and never tracked.
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> Result<UploadReport, WizardError> {
        let policy = self.settings.lock().await.policy.clone();
        let mut controller = self.controller.lock().await;
        let current = controller.current_step();
        if current != WizardStep::DocumentUpload {
            return Err(StepError::Unreachable {
                target: WizardStep::DocumentUpload,
                current,
            }
            .into());
        }
        let job_description_id = controller.state().job_description.as_ref().map(|j| j.id);

        let mut runs = self.runs.lock().await;
        let mut report = UploadReport::default();
        for file in files {
            let extension = match policy.check(&file.name, file.bytes.len() as u64) {
                Ok(extension) => extension,
                Err(reason) => {
                    warn!("Rejected '{}': {}", file.name, reason);
                    report.rejected.push(RejectedFile {
                        name: file.name,
                        reason,
                    });
                    continue;
                }
            };
            let document = Document::pending(&file.name, &extension, file.bytes.len() as u64);
            controller.add_document(document.clone())?;
            report.accepted.push(document.id);

            let handle = tokio::spawn(upload_document(
                self.controller.clone(),
                self.pipeline.clone(),
                document,
                file.bytes,
                job_description_id,
                runs.uploads_token.child_token(),
            ));
            runs.uploads.push(handle);
        }
        info!(
            "{} files accepted, {} rejected",
            report.accepted.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    /// Waits for every upload started so far.
    pub async fn wait_for_uploads(&self) -> Vec<UploadOutcome> {
        let handles = std::mem::take(&mut self.runs.lock().await.uploads);
        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("Upload task panicked: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Drops a document locally and, once it reached the backend, remotely.
    pub async fn remove_document(&self, id: Uuid) -> Result<Option<Document>, WizardError> {
        let removed = self.controller.lock().await.remove_document(id)?;
        if let Some(document) = &removed {
            if document.status != DocumentStatus::Uploading {
                if let Err(e) = self.pipeline.delete_document(id).await {
                    warn!("Remote delete of {} failed: {}", id, e);
                }
            }
        }
        Ok(removed)
    }

    /// Replaces the tracked documents with the backend's list.
    pub async fn sync_documents(&self) -> Result<usize, WizardError> {
        let documents = self.pipeline.list_documents().await?;
        let count = documents.len();
        let mut controller = self.controller.lock().await;
        if let Some(busy) = controller
            .state()
            .documents
            .iter()
            .find(|d| d.status == DocumentStatus::Processing)
        {
            return Err(StepError::DocumentBusy(busy.id).into());
        }
        controller.set_documents(documents)?;
        Ok(count)
    }

    // --- Step 2: processing ---

    /// Submits the tracked documents as a batch and starts polling it.
    pub async fn begin_processing(&self) -> Result<BatchId, WizardError> {
        let token = CancellationToken::new();
        let request = {
            let mut controller = self.controller.lock().await;
            let request = controller.begin_processing()?;
            let mut runs = self.runs.lock().await;
            runs.cancel_processing();
            runs.processing = Some(ProcessingRun {
                token: token.clone(),
                handle: None,
            });
            request
        };

        let started = self
            .pipeline
            .start_processing(Some(request.job_description_id), &request.document_ids)
            .await;

        let mut controller = self.controller.lock().await;
        if token.is_cancelled() {
            if let Ok(batch_id) = started {
                warn!("Batch {} started after the wizard moved on", batch_id);
            }
            return Err(StepError::NotProcessing.into());
        }
        let batch_id = match started {
            Ok(batch_id) => batch_id,
            Err(e) => {
                error!("Could not start processing: {}", e);
                controller.fail_processing()?;
                return Err(e.into());
            }
        };
        drop(controller);

        let settings = {
            let settings = self.settings.lock().await;
            PollSettings {
                interval: settings.poll_interval,
                timeout: settings.processing_timeout,
            }
        };
        let handle = tokio::spawn(poll_batch(
            self.controller.clone(),
            self.pipeline.clone(),
            batch_id,
            settings,
            token.clone(),
        ));

        // A newer run or a reset cancels this token before replacing the run.
        let mut runs = self.runs.lock().await;
        if !token.is_cancelled() {
            runs.last_batch = Some(batch_id);
            if let Some(run) = runs.processing.as_mut() {
                run.handle = Some(handle);
            }
        }
        info!(
            "Processing batch {} with {} documents",
            batch_id,
            request.document_ids.len()
        );
        Ok(batch_id)
    }

    /// Waits for the current polling task, if any.
    pub async fn wait_for_processing(&self) -> Option<BatchOutcome> {
        let handle = self
            .runs
            .lock()
            .await
            .processing
            .as_mut()
            .and_then(|run| run.handle.take())?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Processing task panicked: {}", e);
                None
            }
        }
    }

    // --- Step 3: results ---

    /// Downloads a rendered report for the last batch that was started.
    pub async fn download_report(&self, format: ReportFormat) -> Result<Report, WizardError> {
        let batch_id = self.runs.lock().await.last_batch.ok_or(WizardError::NoResults)?;
        Ok(self
            .pipeline
            .download_evaluation_report(batch_id, format)
            .await?)
    }
}
