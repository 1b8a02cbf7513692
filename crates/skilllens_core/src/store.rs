//! crates/skilllens_core/src/store.rs
//!
//! The reducer-style state store. Every mutation is a `WizardAction` applied
//! through `reduce`, which derives a complete new `WizardState` from the old one
//! without touching the outside world.

use crate::domain::{
    Document, DocumentPatch, EvaluationResult, InfoPage, JobDescription, View, WizardState,
    WizardStep,
};
use uuid::Uuid;

/// Every mutation the store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
    SetView(View),
    SetStep(WizardStep),
    SetCurrentPage(InfoPage),
    SetJobDescription(JobDescription),
    AddDocument(Document),
    UpdateDocument { id: Uuid, patch: DocumentPatch },
    RemoveDocument(Uuid),
    SetDocuments(Vec<Document>),
    SetEvaluationResults(Vec<EvaluationResult>),
    SetProcessing(bool),
    SetProcessingProgress(f32),
    Reset,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Document {0} is already tracked")]
    DuplicateDocument(Uuid),
}

/// Applies one action to a state snapshot.
pub fn reduce(state: &WizardState, action: WizardAction) -> Result<WizardState, StoreError> {
    let mut next = state.clone();
    match action {
        WizardAction::SetView(view) => next.current_view = view,
        WizardAction::SetStep(step) => next.current_step = step,
        WizardAction::SetCurrentPage(page) => next.current_page = Some(page),
        WizardAction::SetJobDescription(jd) => next.job_description = Some(jd),
        WizardAction::AddDocument(document) => {
            if state.document(document.id).is_some() {
                return Err(StoreError::DuplicateDocument(document.id));
            }
            next.documents.push(document);
        }
        WizardAction::UpdateDocument { id, patch } => {
            if let Some(document) = next.documents.iter_mut().find(|d| d.id == id) {
                patch.apply(document);
            }
        }
        WizardAction::RemoveDocument(id) => next.documents.retain(|d| d.id != id),
        WizardAction::SetDocuments(documents) => next.documents = documents,
        WizardAction::SetEvaluationResults(results) => next.evaluation_results = results,
        WizardAction::SetProcessing(flag) => next.is_processing = flag,
        WizardAction::SetProcessingProgress(pct) => next.processing_progress = pct,
        WizardAction::Reset => {
            next = WizardState {
                current_view: View::Home,
                ..WizardState::default()
            }
        }
    }
    Ok(next)
}

/// Owns the current snapshot and swaps it atomically on each dispatch.
#[derive(Debug, Clone, Default)]
pub struct WizardStore {
    state: WizardState,
}

impl WizardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Applies an action; on error the previous snapshot is kept as-is.
    pub fn dispatch(&mut self, action: WizardAction) -> Result<(), StoreError> {
        self.state = reduce(&self.state, action)?;
        Ok(())
    }

    /// Applies a sequence of actions as one unit: either all land or none do.
    pub fn dispatch_all<I>(&mut self, actions: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = WizardAction>,
    {
        let mut next = self.state.clone();
        for action in actions {
            next = reduce(&next, action)?;
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentStatus, ScoreBreakdown};
    use chrono::Utc;

    fn doc(name: &str) -> Document {
        Document::pending(name, "pdf", 100)
    }

    #[test]
    fn document_list_reflects_adds_removes_and_updates() {
        let mut store = WizardStore::new();
        let a = doc("a.pdf");
        let b = doc("b.pdf");
        let c = doc("c.pdf");
        store.dispatch(WizardAction::AddDocument(a.clone())).unwrap();
        store.dispatch(WizardAction::AddDocument(b.clone())).unwrap();
        store.dispatch(WizardAction::AddDocument(c.clone())).unwrap();
        store.dispatch(WizardAction::RemoveDocument(b.id)).unwrap();
        store
            .dispatch(WizardAction::UpdateDocument {
                id: c.id,
                patch: DocumentPatch::status(DocumentStatus::Uploaded),
            })
            .unwrap();

        let ids: Vec<Uuid> = store.state().documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(store.state().document(a.id).unwrap().status, DocumentStatus::Uploading);
        assert_eq!(store.state().document(c.id).unwrap().status, DocumentStatus::Uploaded);
    }

    /// xorshift64; a fixed seed keeps failures reproducible.
    struct Rng(u64);

    impl Rng {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next() % n as u64) as usize
        }
    }

    #[test]
    fn random_document_sequences_match_a_plain_list() {
        const STATUSES: [DocumentStatus; 5] = [
            DocumentStatus::Uploading,
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::Processed,
            DocumentStatus::Error,
        ];

        for seed in 1..=200u64 {
            let mut rng = Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let mut store = WizardStore::new();
            let mut model: Vec<Document> = Vec::new();

            for step in 0..60 {
                let known = if model.is_empty() {
                    None
                } else {
                    Some(model[rng.below(model.len())].id)
                };
                // Half of the removes and updates aim at an id nobody tracks.
                let target = match known {
                    Some(id) if rng.below(2) == 0 => id,
                    _ => Uuid::new_v4(),
                };

                match rng.below(4) {
                    0 | 1 => {
                        let mut document = doc(&format!("{}-{}.pdf", seed, step));
                        if let (Some(id), 0) = (known, rng.below(4)) {
                            document.id = id;
                            let before = store.state().clone();
                            let err = store
                                .dispatch(WizardAction::AddDocument(document))
                                .unwrap_err();
                            assert_eq!(err, StoreError::DuplicateDocument(id));
                            assert_eq!(store.state(), &before);
                        } else {
                            store
                                .dispatch(WizardAction::AddDocument(document.clone()))
                                .unwrap();
                            model.push(document);
                        }
                    }
                    2 => {
                        store.dispatch(WizardAction::RemoveDocument(target)).unwrap();
                        model.retain(|d| d.id != target);
                    }
                    _ => {
                        let status = STATUSES[rng.below(STATUSES.len())];
                        store
                            .dispatch(WizardAction::UpdateDocument {
                                id: target,
                                patch: DocumentPatch::status(status),
                            })
                            .unwrap();
                        if let Some(d) = model.iter_mut().find(|d| d.id == target) {
                            d.status = status;
                        }
                    }
                }

                assert_eq!(store.state().documents, model, "seed {} step {}", seed, step);
            }
        }
    }

    #[test]
    fn duplicate_add_is_rejected_and_state_kept() {
        let mut store = WizardStore::new();
        let a = doc("a.pdf");
        store.dispatch(WizardAction::AddDocument(a.clone())).unwrap();
        let before = store.state().clone();
        let err = store.dispatch(WizardAction::AddDocument(a.clone())).unwrap_err();
        assert_eq!(err, StoreError::DuplicateDocument(a.id));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn update_of_unknown_id_is_a_no_op() {
        let mut store = WizardStore::new();
        store.dispatch(WizardAction::AddDocument(doc("a.pdf"))).unwrap();
        let before = store.state().clone();
        store
            .dispatch(WizardAction::UpdateDocument {
                id: Uuid::new_v4(),
                patch: DocumentPatch::status(DocumentStatus::Error),
            })
            .unwrap();
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn reset_returns_to_initial_state_on_home() {
        let mut store = WizardStore::new();
        store
            .dispatch_all([
                WizardAction::SetView(View::Process),
                WizardAction::SetStep(WizardStep::Results),
                WizardAction::SetCurrentPage(InfoPage::Contact),
                WizardAction::SetJobDescription(JobDescription::from_form(
                    None,
                    "Backend Engineer",
                    "5+ years Go",
                    Utc::now(),
                )),
                WizardAction::AddDocument(doc("a.pdf")),
                WizardAction::SetEvaluationResults(vec![EvaluationResult {
                    candidate_id: "candidate-1".into(),
                    candidate_name: "Ana".into(),
                    document_id: Uuid::new_v4(),
                    score: 4.0,
                    details: ScoreBreakdown::default(),
                    extracted_info: Default::default(),
                }]),
                WizardAction::SetProcessing(true),
                WizardAction::SetProcessingProgress(42.0),
            ])
            .unwrap();

        store.dispatch(WizardAction::Reset).unwrap();
        assert_eq!(store.state(), &WizardState::default());
        assert_eq!(store.state().current_view, View::Home);
    }

    #[test]
    fn progress_is_stored_unclamped() {
        let next = reduce(&WizardState::default(), WizardAction::SetProcessingProgress(140.0)).unwrap();
        assert_eq!(next.processing_progress, 140.0);
    }

    #[test]
    fn failed_batch_dispatch_leaves_state_untouched() {
        let mut store = WizardStore::new();
        let a = doc("a.pdf");
        let before = store.state().clone();
        let result = store.dispatch_all([
            WizardAction::SetView(View::Process),
            WizardAction::AddDocument(a.clone()),
            WizardAction::AddDocument(a),
        ]);
        assert!(result.is_err());
        assert_eq!(store.state(), &before);
    }
}
