//! crates/skilllens_core/src/steps.rs
//!
//! The step controller: a finite state machine over the four wizard steps that
//! owns the store and refuses transitions whose data preconditions do not hold.

use crate::domain::{
    Document, DocumentPatch, DocumentStatus, EvaluationResult, InfoPage, JobDescription, View,
    WizardState, WizardStep,
};
use crate::store::{StoreError, WizardAction, WizardStore};
use crate::validation::{validate_job_description, ValidationError};
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("There is no step {0}")]
    InvalidStep(usize),
    #[error("Step {target:?} cannot be reached from {current:?}")]
    Unreachable {
        target: WizardStep,
        current: WizardStep,
    },
    #[error("A saved job description is required")]
    JobDescriptionRequired,
    #[error("At least one document is required")]
    NoDocuments,
    #[error("Documents are not uploaded yet: {0:?}")]
    DocumentsNotReady(Vec<Uuid>),
    #[error("Document {0} is part of a running batch")]
    DocumentBusy(Uuid),
    #[error("No processing run is active")]
    NotProcessing,
    #[error("Expected {expected} results, received {actual}")]
    ResultCountMismatch { expected: usize, actual: usize },
    #[error("Result references document {0}, which is not in the batch")]
    UnexpectedResult(Uuid),
    #[error("Result for document {0} has a score outside 0-5")]
    ScoreOutOfRange(Uuid),
}

/// What the pipeline needs to start a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    pub job_description_id: Uuid,
    pub document_ids: Vec<Uuid>,
}

/// Drives the wizard through its steps.
#[derive(Debug, Clone, Default)]
pub struct StepController {
    store: WizardStore,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WizardState {
        self.store.state()
    }

    pub fn current_step(&self) -> WizardStep {
        self.state().current_step
    }

    // --- Views ---

    /// Enters the process view at the job-description step.
    pub fn start_process(&mut self) -> Result<(), StepError> {
        self.go_to(WizardStep::JobDescription)
    }

    /// Shows the home view. An interrupted batch returns the wizard to the upload step.
    pub fn go_home(&mut self) -> Result<(), StepError> {
        let mut actions = self.leave_process_view_actions();
        actions.push(WizardAction::SetView(View::Home));
        self.store.dispatch_all(actions)?;
        Ok(())
    }

    pub fn open_page(&mut self, page: InfoPage) -> Result<(), StepError> {
        let mut actions = self.leave_process_view_actions();
        actions.push(WizardAction::SetView(View::Page));
        actions.push(WizardAction::SetCurrentPage(page));
        self.store.dispatch_all(actions)?;
        Ok(())
    }

    // --- Step navigation ---

    /// Whether a menu jump to `target` is allowed right now.
    pub fn can_enter(&self, target: WizardStep) -> bool {
        let state = self.state();
        let current = state.current_step;
        match target {
            WizardStep::JobDescription => true,
            WizardStep::DocumentUpload => target <= current || state.has_saved_job_description(),
            WizardStep::Processing => current == WizardStep::Processing,
            WizardStep::Results => target <= current || !state.evaluation_results.is_empty(),
        }
    }

    /// Jumps to a step by its index.
    pub fn go_to_index(&mut self, index: usize) -> Result<(), StepError> {
        let step = WizardStep::from_index(index).ok_or(StepError::InvalidStep(index))?;
        self.go_to(step)
    }

    /// Jumps to a step in the process view, enforcing `can_enter`.
    pub fn go_to(&mut self, target: WizardStep) -> Result<(), StepError> {
        if !self.can_enter(target) {
            return Err(StepError::Unreachable {
                target,
                current: self.current_step(),
            });
        }
        let mut actions = Vec::new();
        if target != WizardStep::Processing {
            actions.extend(self.leave_processing_actions());
        }
        actions.push(WizardAction::SetView(View::Process));
        actions.push(WizardAction::SetStep(target));
        self.store.dispatch_all(actions)?;
        Ok(())
    }

    /// Steps back without clearing downstream data. From the first step this
    /// leaves the process view for home.
    pub fn back(&mut self) -> Result<WizardStep, StepError> {
        let current = self.current_step();
        match current.previous() {
            Some(previous) => {
                let mut actions = self.leave_processing_actions();
                actions.push(WizardAction::SetStep(previous));
                self.store.dispatch_all(actions)?;
                Ok(previous)
            }
            None => {
                self.go_home()?;
                Ok(current)
            }
        }
    }

    /// Clears every entity and returns to the home view.
    pub fn reset(&mut self) -> Result<(), StepError> {
        self.store.dispatch(WizardAction::Reset)?;
        Ok(())
    }

    // --- Step 0: job description ---

    /// Validates the form and builds the record to persist, without mutating state.
    pub fn prepare_job_description(
        &self,
        public_description: &str,
        special_conditions: &str,
    ) -> Result<JobDescription, StepError> {
        validate_job_description(public_description, special_conditions)?;
        Ok(JobDescription::from_form(
            self.state().job_description.as_ref(),
            public_description,
            special_conditions,
            Utc::now(),
        ))
    }

    /// Stores a saved job description and advances to the upload step.
    pub fn commit_job_description(&mut self, job: JobDescription) -> Result<(), StepError> {
        validate_job_description(&job.public_description, &job.special_conditions)?;
        self.store.dispatch_all([
            WizardAction::SetJobDescription(job),
            WizardAction::SetView(View::Process),
            WizardAction::SetStep(WizardStep::DocumentUpload),
        ])?;
        Ok(())
    }

    /// `prepare_job_description` followed by `commit_job_description`.
    pub fn save_job_description(
        &mut self,
        public_description: &str,
        special_conditions: &str,
    ) -> Result<JobDescription, StepError> {
        let job = self.prepare_job_description(public_description, special_conditions)?;
        self.commit_job_description(job.clone())?;
        Ok(job)
    }

    // --- Step 1: documents ---

    pub fn add_document(&mut self, document: Document) -> Result<(), StepError> {
        self.store.dispatch(WizardAction::AddDocument(document))?;
        Ok(())
    }

    /// Reconciles a tracked document with the stored descriptor. When the
    /// backend assigned its own id, the document is re-keyed in place.
    pub fn mark_uploaded(&mut self, id: Uuid, stored: &Document) -> Result<(), StepError> {
        let mut patch = DocumentPatch::reconcile(stored);
        patch.status = Some(DocumentStatus::Uploaded);
        if stored.id == id {
            self.store.dispatch(WizardAction::UpdateDocument { id, patch })?;
            return Ok(());
        }

        if self.state().document(stored.id).is_some() {
            return Err(StoreError::DuplicateDocument(stored.id).into());
        }
        let documents = self
            .state()
            .documents
            .iter()
            .cloned()
            .map(|mut document| {
                if document.id == id {
                    patch.apply(&mut document);
                    document.id = stored.id;
                }
                document
            })
            .collect();
        self.store.dispatch(WizardAction::SetDocuments(documents))?;
        Ok(())
    }

    pub fn mark_failed(&mut self, id: Uuid) -> Result<(), StepError> {
        self.store.dispatch(WizardAction::UpdateDocument {
            id,
            patch: DocumentPatch::status(DocumentStatus::Error),
        })?;
        Ok(())
    }

    /// Drops a document. Documents inside a running batch stay put.
    pub fn remove_document(&mut self, id: Uuid) -> Result<Option<Document>, StepError> {
        let removed = self.state().document(id).cloned();
        if let Some(document) = &removed {
            if document.status == DocumentStatus::Processing {
                return Err(StepError::DocumentBusy(id));
            }
        }
        self.store.dispatch(WizardAction::RemoveDocument(id))?;
        Ok(removed)
    }

    /// Replaces the document list wholesale, e.g. after listing the backend.
    pub fn set_documents(&mut self, documents: Vec<Document>) -> Result<(), StepError> {
        self.store.dispatch(WizardAction::SetDocuments(documents))?;
        Ok(())
    }

    // --- Step 2: processing ---

    /// Moves from the upload step into processing. Every document must be
    /// stored by the pipeline (`uploaded`, or `processed` by an earlier run);
    /// the returned request names the batch to submit.
    pub fn begin_processing(&mut self) -> Result<ProcessingRequest, StepError> {
        let state = self.state();
        if state.current_step != WizardStep::DocumentUpload {
            return Err(StepError::Unreachable {
                target: WizardStep::Processing,
                current: state.current_step,
            });
        }
        let job_description_id = match &state.job_description {
            Some(job) if job.is_complete() => job.id,
            _ => return Err(StepError::JobDescriptionRequired),
        };
        if state.documents.is_empty() {
            return Err(StepError::NoDocuments);
        }
        let not_ready: Vec<Uuid> = state
            .documents
            .iter()
            .filter(|d| {
                !matches!(
                    d.status,
                    DocumentStatus::Uploaded | DocumentStatus::Processed
                )
            })
            .map(|d| d.id)
            .collect();
        if !not_ready.is_empty() {
            return Err(StepError::DocumentsNotReady(not_ready));
        }

        let document_ids: Vec<Uuid> = state.documents.iter().map(|d| d.id).collect();
        let mut actions: Vec<WizardAction> = document_ids
            .iter()
            .map(|&id| WizardAction::UpdateDocument {
                id,
                patch: DocumentPatch {
                    status: Some(DocumentStatus::Processing),
                    processing_progress: Some(0.0),
                    ..Default::default()
                },
            })
            .collect();
        actions.extend([
            WizardAction::SetStep(WizardStep::Processing),
            WizardAction::SetProcessing(true),
            WizardAction::SetProcessingProgress(0.0),
        ]);
        self.store.dispatch_all(actions)?;

        Ok(ProcessingRequest {
            job_description_id,
            document_ids,
        })
    }

    /// Records a progress report from the pipeline, clamped to `[0, 100]`.
    pub fn record_progress(&mut self, progress_pct: f32) -> Result<(), StepError> {
        if !self.state().is_processing {
            return Err(StepError::NotProcessing);
        }
        let pct = if progress_pct.is_nan() {
            0.0
        } else {
            progress_pct.clamp(0.0, 100.0)
        };
        let mut actions: Vec<WizardAction> = self
            .batch_document_ids()
            .into_iter()
            .map(|id| WizardAction::UpdateDocument {
                id,
                patch: DocumentPatch {
                    processing_progress: Some(pct),
                    ..Default::default()
                },
            })
            .collect();
        actions.push(WizardAction::SetProcessingProgress(pct));
        self.store.dispatch_all(actions)?;
        Ok(())
    }

    // --- Step 3: results ---

    /// Accepts the batch's results and moves to the results step. Exactly one
    /// in-range result per submitted document is required.
    pub fn complete_processing(&mut self, results: Vec<EvaluationResult>) -> Result<(), StepError> {
        if !self.state().is_processing {
            return Err(StepError::NotProcessing);
        }
        let batch: HashSet<Uuid> = self.batch_document_ids().into_iter().collect();
        if results.len() != batch.len() {
            return Err(StepError::ResultCountMismatch {
                expected: batch.len(),
                actual: results.len(),
            });
        }
        let mut seen = HashSet::new();
        for result in &results {
            if !batch.contains(&result.document_id) || !seen.insert(result.document_id) {
                return Err(StepError::UnexpectedResult(result.document_id));
            }
            if !result.scores_in_range() {
                return Err(StepError::ScoreOutOfRange(result.document_id));
            }
        }

        let mut actions: Vec<WizardAction> = batch
            .iter()
            .map(|&id| WizardAction::UpdateDocument {
                id,
                patch: DocumentPatch {
                    status: Some(DocumentStatus::Processed),
                    processing_progress: Some(100.0),
                    ..Default::default()
                },
            })
            .collect();
        actions.extend([
            WizardAction::SetEvaluationResults(results),
            WizardAction::SetProcessingProgress(100.0),
            WizardAction::SetProcessing(false),
            WizardAction::SetStep(WizardStep::Results),
        ]);
        self.store.dispatch_all(actions)?;
        Ok(())
    }

    /// Marks the running batch failed: its documents go to `error` and the
    /// wizard returns to the upload step for manual recovery.
    pub fn fail_processing(&mut self) -> Result<Vec<Uuid>, StepError> {
        let failed = self.batch_document_ids();
        let mut actions: Vec<WizardAction> = failed
            .iter()
            .map(|&id| WizardAction::UpdateDocument {
                id,
                patch: DocumentPatch::status(DocumentStatus::Error),
            })
            .collect();
        actions.push(WizardAction::SetProcessing(false));
        if self.current_step() == WizardStep::Processing {
            actions.push(WizardAction::SetStep(WizardStep::DocumentUpload));
        }
        self.store.dispatch_all(actions)?;
        Ok(failed)
    }

    fn batch_document_ids(&self) -> Vec<Uuid> {
        self.state()
            .documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Processing)
            .map(|d| d.id)
            .collect()
    }

    /// Actions that abandon a running batch: documents fall back to `uploaded`.
    fn leave_process_view_actions(&self) -> Vec<WizardAction> {
        let mut actions = self.leave_processing_actions();
        if self.current_step() == WizardStep::Processing {
            actions.push(WizardAction::SetStep(WizardStep::DocumentUpload));
        }
        actions
    }

    fn leave_processing_actions(&self) -> Vec<WizardAction> {
        if !self.state().is_processing {
            return Vec::new();
        }
        let mut actions: Vec<WizardAction> = self
            .batch_document_ids()
            .into_iter()
            .map(|id| WizardAction::UpdateDocument {
                id,
                patch: DocumentPatch::status(DocumentStatus::Uploaded),
            })
            .collect();
        actions.push(WizardAction::SetProcessing(false));
        actions.push(WizardAction::SetProcessingProgress(0.0));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateInfo, ScoreBreakdown};

    fn uploaded(controller: &mut StepController, name: &str) -> Uuid {
        let doc = Document::pending(name, "pdf", 2 * 1024 * 1024);
        let id = doc.id;
        controller.add_document(doc.clone()).unwrap();
        controller.mark_uploaded(id, &doc).unwrap();
        id
    }

    fn result_for(document_id: Uuid, score: f32) -> EvaluationResult {
        EvaluationResult {
            candidate_id: format!("candidate-{}", document_id),
            candidate_name: "Candidate".into(),
            document_id,
            score,
            details: ScoreBreakdown {
                experience: score,
                skills: score,
                education: score,
                compatibility: score,
            },
            extracted_info: CandidateInfo::default(),
        }
    }

    fn ready_for_upload() -> StepController {
        let mut controller = StepController::new();
        controller.start_process().unwrap();
        controller
            .save_job_description("Backend Engineer", "5+ years Go")
            .unwrap();
        controller
    }

    #[test]
    fn saving_job_description_advances_to_upload() {
        let controller = ready_for_upload();
        let state = controller.state();
        assert_eq!(state.current_step, WizardStep::DocumentUpload);
        assert_eq!(state.current_view, View::Process);
        assert_eq!(
            state.job_description.as_ref().unwrap().public_description,
            "Backend Engineer"
        );
    }

    #[test]
    fn blank_job_description_is_rejected_and_step_kept() {
        let mut controller = StepController::new();
        controller.start_process().unwrap();
        let err = controller.save_job_description("Backend Engineer", " ").unwrap_err();
        assert!(matches!(err, StepError::Validation(_)));
        assert_eq!(controller.current_step(), WizardStep::JobDescription);
        assert!(controller.state().job_description.is_none());
    }

    #[test]
    fn upload_step_requires_saved_job_description() {
        let mut controller = StepController::new();
        controller.start_process().unwrap();
        assert!(!controller.can_enter(WizardStep::DocumentUpload));
        assert_eq!(
            controller.go_to_index(1),
            Err(StepError::Unreachable {
                target: WizardStep::DocumentUpload,
                current: WizardStep::JobDescription,
            })
        );
        assert_eq!(controller.go_to_index(9), Err(StepError::InvalidStep(9)));
    }

    #[test]
    fn processing_requires_documents() {
        let mut controller = ready_for_upload();
        assert_eq!(controller.begin_processing(), Err(StepError::NoDocuments));
        assert!(!controller.state().is_processing);
    }

    #[test]
    fn processing_waits_for_uploads_to_finish() {
        let mut controller = ready_for_upload();
        let pending = Document::pending("cv.pdf", "pdf", 10);
        let pending_id = pending.id;
        controller.add_document(pending).unwrap();
        assert_eq!(
            controller.begin_processing(),
            Err(StepError::DocumentsNotReady(vec![pending_id]))
        );
    }

    #[test]
    fn entering_processing_sets_flags() {
        let mut controller = ready_for_upload();
        let id = uploaded(&mut controller, "a.pdf");
        let request = controller.begin_processing().unwrap();
        assert_eq!(request.document_ids, vec![id]);
        let state = controller.state();
        assert_eq!(state.current_step, WizardStep::Processing);
        assert!(state.is_processing);
        assert_eq!(state.processing_progress, 0.0);
        assert_eq!(state.document(id).unwrap().status, DocumentStatus::Processing);
    }

    #[test]
    fn completion_writes_one_result_per_document() {
        let mut controller = ready_for_upload();
        let ids: Vec<Uuid> = (0..3)
            .map(|i| uploaded(&mut controller, &format!("cv{}.pdf", i)))
            .collect();
        controller.begin_processing().unwrap();
        controller.record_progress(55.0).unwrap();
        assert_eq!(controller.state().processing_progress, 55.0);

        let results = ids.iter().map(|&id| result_for(id, 3.5)).collect();
        controller.complete_processing(results).unwrap();

        let state = controller.state();
        assert_eq!(state.evaluation_results.len(), 3);
        assert!(!state.is_processing);
        assert_eq!(state.processing_progress, 100.0);
        assert_eq!(state.current_step, WizardStep::Results);
        assert!(state
            .documents
            .iter()
            .all(|d| d.status == DocumentStatus::Processed));
    }

    #[test]
    fn out_of_range_or_missing_results_are_refused() {
        let mut controller = ready_for_upload();
        let a = uploaded(&mut controller, "a.pdf");
        let b = uploaded(&mut controller, "b.pdf");
        controller.begin_processing().unwrap();

        assert_eq!(
            controller.complete_processing(vec![result_for(a, 4.0)]),
            Err(StepError::ResultCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            controller.complete_processing(vec![result_for(a, 4.0), result_for(b, 5.5)]),
            Err(StepError::ScoreOutOfRange(b))
        );
        assert_eq!(
            controller.complete_processing(vec![result_for(a, 4.0), result_for(a, 4.0)]),
            Err(StepError::UnexpectedResult(a))
        );
        assert!(controller.state().is_processing);
    }

    #[test]
    fn failure_marks_batch_documents_as_errors() {
        let mut controller = ready_for_upload();
        let a = uploaded(&mut controller, "a.pdf");
        controller.begin_processing().unwrap();
        let failed = controller.fail_processing().unwrap();
        assert_eq!(failed, vec![a]);
        let state = controller.state();
        assert_eq!(state.document(a).unwrap().status, DocumentStatus::Error);
        assert!(!state.is_processing);
        assert_eq!(state.current_step, WizardStep::DocumentUpload);
    }

    #[test]
    fn upload_adopts_the_backend_id_in_place() {
        let mut controller = ready_for_upload();
        let first = uploaded(&mut controller, "first.pdf");
        let local = Document::pending("cv.pdf", "pdf", 1024);
        let local_id = local.id;
        controller.add_document(local.clone()).unwrap();
        let last = uploaded(&mut controller, "last.pdf");

        let stored = Document {
            id: Uuid::new_v4(),
            filename: "server-name.pdf".to_string(),
            status: DocumentStatus::Uploaded,
            ..local
        };
        controller.mark_uploaded(local_id, &stored).unwrap();

        let ids: Vec<Uuid> = controller.state().documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first, stored.id, last]);
        assert!(controller.state().document(local_id).is_none());
        let doc = controller.state().document(stored.id).unwrap();
        assert_eq!(doc.filename, "server-name.pdf");
        assert_eq!(doc.status, DocumentStatus::Uploaded);

        let clash = Document {
            id: first,
            ..Document::pending("again.pdf", "pdf", 1)
        };
        let pending = Document::pending("again.pdf", "pdf", 1);
        let pending_id = pending.id;
        controller.add_document(pending).unwrap();
        assert_eq!(
            controller.mark_uploaded(pending_id, &clash),
            Err(StepError::Store(StoreError::DuplicateDocument(first)))
        );
    }

    #[test]
    fn going_home_mid_batch_releases_the_documents() {
        let mut controller = ready_for_upload();
        let a = uploaded(&mut controller, "a.pdf");
        controller.begin_processing().unwrap();

        controller.go_home().unwrap();
        let state = controller.state();
        assert_eq!(state.current_view, View::Home);
        assert_eq!(state.current_step, WizardStep::DocumentUpload);
        assert!(!state.is_processing);
        assert_eq!(state.document(a).unwrap().status, DocumentStatus::Uploaded);

        controller.go_to(WizardStep::DocumentUpload).unwrap();
        controller.begin_processing().unwrap();
        controller.open_page(InfoPage::About).unwrap();
        assert_eq!(controller.state().current_view, View::Page);
        assert_eq!(controller.current_step(), WizardStep::DocumentUpload);
        assert!(!controller.state().is_processing);
        assert!(controller.complete_processing(vec![result_for(a, 2.0)]).is_err());
    }

    #[test]
    fn back_keeps_downstream_data() {
        let mut controller = ready_for_upload();
        let a = uploaded(&mut controller, "a.pdf");
        controller.begin_processing().unwrap();
        controller.complete_processing(vec![result_for(a, 2.0)]).unwrap();

        assert_eq!(controller.back().unwrap(), WizardStep::Processing);
        assert_eq!(controller.back().unwrap(), WizardStep::DocumentUpload);
        assert_eq!(controller.state().documents.len(), 1);
        assert_eq!(controller.state().evaluation_results.len(), 1);
        assert!(controller.can_enter(WizardStep::Results));
        controller.go_to(WizardStep::Results).unwrap();
        assert_eq!(controller.current_step(), WizardStep::Results);
    }

    #[test]
    fn leaving_processing_returns_documents_to_uploaded() {
        let mut controller = ready_for_upload();
        let a = uploaded(&mut controller, "a.pdf");
        controller.begin_processing().unwrap();
        assert_eq!(controller.remove_document(a), Err(StepError::DocumentBusy(a)));

        controller.back().unwrap();
        let state = controller.state();
        assert!(!state.is_processing);
        assert_eq!(state.document(a).unwrap().status, DocumentStatus::Uploaded);
        assert!(!controller.can_enter(WizardStep::Processing));
    }

    #[test]
    fn back_from_first_step_goes_home() {
        let mut controller = StepController::new();
        controller.start_process().unwrap();
        controller.back().unwrap();
        assert_eq!(controller.state().current_view, View::Home);
    }

    #[test]
    fn reset_clears_everything() {
        let mut controller = ready_for_upload();
        uploaded(&mut controller, "a.pdf");
        controller.open_page(InfoPage::About).unwrap();
        controller.reset().unwrap();
        assert_eq!(controller.state(), &WizardState::default());
    }

    #[test]
    fn progress_outside_processing_is_refused() {
        let mut controller = ready_for_upload();
        assert_eq!(controller.record_progress(10.0), Err(StepError::NotProcessing));
    }
}
