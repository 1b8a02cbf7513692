//! crates/skilllens_core/src/domain.rs
//!
//! Defines the pure, core data structures for a wizard session.
//! These structs are independent of any wire or storage format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lowest score any evaluation dimension may carry.
pub const MIN_SCORE: f32 = 0.0;
/// Highest score any evaluation dimension may carry.
pub const MAX_SCORE: f32 = 5.0;

//=========================================================================================
// Job Description
//=========================================================================================

/// The saved job description a batch of CVs is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription {
    pub id: Uuid,
    pub public_description: String,
    pub special_conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDescription {
    /// Builds the record saved from the form. A previous record keeps its
    /// identity and creation time; only the text and `updated_at` change.
    pub fn from_form(
        previous: Option<&JobDescription>,
        public_description: &str,
        special_conditions: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: previous.map(|jd| jd.id).unwrap_or_else(Uuid::new_v4),
            public_description: public_description.trim().to_string(),
            special_conditions: special_conditions.trim().to_string(),
            created_at: previous.map(|jd| jd.created_at).unwrap_or(now),
            updated_at: now,
        }
    }

    /// Both text fields carry content.
    pub fn is_complete(&self) -> bool {
        !self.public_description.trim().is_empty() && !self.special_conditions.trim().is_empty()
    }
}

//=========================================================================================
// Documents
//=========================================================================================

/// Lifecycle of an uploaded CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    Uploading,
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(DocumentStatus::Uploading),
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "processed" => Ok(DocumentStatus::Processed),
            "error" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status '{}'", other)),
        }
    }
}

/// A candidate CV tracked by the wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    /// Generated storage filename, `{id}.{ext}`.
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub processing_progress: Option<f32>,
    /// Storage path reference, `{id}/input`.
    pub path: String,
}

impl Document {
    /// A freshly accepted file that has not reached the pipeline yet.
    pub fn pending(original_name: &str, extension: &str, size: u64) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            filename: format!("{}.{}", id, extension),
            original_name: original_name.to_string(),
            size,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Uploading,
            processing_progress: None,
            path: format!("{}/input", id),
        }
    }
}

/// A partial update merged into an existing `Document`.
/// `None` fields leave the document untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub status: Option<DocumentStatus>,
    pub processing_progress: Option<f32>,
    pub path: Option<String>,
}

impl DocumentPatch {
    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Takes every server-assigned field from a stored descriptor.
    pub fn reconcile(stored: &Document) -> Self {
        Self {
            filename: Some(stored.filename.clone()),
            size: Some(stored.size),
            uploaded_at: Some(stored.uploaded_at),
            status: Some(stored.status),
            processing_progress: stored.processing_progress,
            path: Some(stored.path.clone()),
        }
    }

    pub fn apply(&self, document: &mut Document) {
        if let Some(filename) = &self.filename {
            document.filename = filename.clone();
        }
        if let Some(size) = self.size {
            document.size = size;
        }
        if let Some(uploaded_at) = self.uploaded_at {
            document.uploaded_at = uploaded_at;
        }
        if let Some(status) = self.status {
            document.status = status;
        }
        if let Some(progress) = self.processing_progress {
            document.processing_progress = Some(progress);
        }
        if let Some(path) = &self.path {
            document.path = path.clone();
        }
    }
}

//=========================================================================================
// Evaluation Results
//=========================================================================================

/// The four sub-scores behind a candidate's overall score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub experience: f32,
    pub skills: f32,
    pub education: f32,
    pub compatibility: f32,
}

impl ScoreBreakdown {
    pub fn values(&self) -> [f32; 4] {
        [self.experience, self.skills, self.education, self.compatibility]
    }
}

/// Structured data pulled out of a CV.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub experience: Vec<String>,
    pub skills: Vec<String>,
    pub education: Vec<String>,
}

/// The evaluation of one processed document.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub candidate_id: String,
    pub candidate_name: String,
    pub document_id: Uuid,
    pub score: f32,
    pub details: ScoreBreakdown,
    pub extracted_info: CandidateInfo,
}

impl EvaluationResult {
    /// Overall score and every sub-score lie within `[MIN_SCORE, MAX_SCORE]`.
    pub fn scores_in_range(&self) -> bool {
        std::iter::once(self.score)
            .chain(self.details.values())
            .all(|s| s.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&s))
    }
}

/// Clamps a raw score onto the 0–5 scale.
pub fn clamp_score(raw: f32) -> f32 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

//=========================================================================================
// Navigation
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Process,
    Page,
}

/// Informational pages reachable from the side menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoPage {
    About,
    Contact,
    ReportBug,
}

impl InfoPage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoPage::About => "about",
            InfoPage::Contact => "contact",
            InfoPage::ReportBug => "report-bug",
        }
    }
}

impl FromStr for InfoPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "about" => Ok(InfoPage::About),
            "contact" => Ok(InfoPage::Contact),
            "report-bug" => Ok(InfoPage::ReportBug),
            other => Err(format!("unknown page '{}'", other)),
        }
    }
}

/// The four ordered steps of the process view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WizardStep {
    #[default]
    JobDescription,
    DocumentUpload,
    Processing,
    Results,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::JobDescription,
        WizardStep::DocumentUpload,
        WizardStep::Processing,
        WizardStep::Results,
    ];

    pub fn index(&self) -> usize {
        match self {
            WizardStep::JobDescription => 0,
            WizardStep::DocumentUpload => 1,
            WizardStep::Processing => 2,
            WizardStep::Results => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn previous(&self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }
}

//=========================================================================================
// Wizard State
//=========================================================================================

/// The single source of truth for one wizard session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WizardState {
    pub current_view: View,
    pub current_step: WizardStep,
    pub current_page: Option<InfoPage>,
    pub job_description: Option<JobDescription>,
    pub documents: Vec<Document>,
    pub evaluation_results: Vec<EvaluationResult>,
    pub is_processing: bool,
    /// Percentage in `[0, 100]`; the store itself does not clamp it.
    pub processing_progress: f32,
}

impl WizardState {
    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn has_saved_job_description(&self) -> bool {
        self.job_description
            .as_ref()
            .map(JobDescription::is_complete)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_document_derives_names_from_id() {
        let doc = Document::pending("Jane Doe CV.pdf", "pdf", 2048);
        assert_eq!(doc.filename, format!("{}.pdf", doc.id));
        assert_eq!(doc.path, format!("{}/input", doc.id));
        assert_eq!(doc.status, DocumentStatus::Uploading);
        assert_eq!(doc.original_name, "Jane Doe CV.pdf");
    }

    #[test]
    fn resaving_job_description_keeps_identity() {
        let first = JobDescription::from_form(None, "Backend Engineer", "5+ years Go", Utc::now());
        let later = first.created_at + chrono::Duration::minutes(5);
        let second = JobDescription::from_form(Some(&first), "Backend Engineer II", "Go", later);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.updated_at, later);
        assert_eq!(second.public_description, "Backend Engineer II");
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut doc = Document::pending("cv.pdf", "pdf", 10);
        let original_path = doc.path.clone();
        DocumentPatch::status(DocumentStatus::Uploaded).apply(&mut doc);
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.path, original_path);
        assert_eq!(doc.processing_progress, None);
    }

    #[test]
    fn step_indices_round_trip_and_bound() {
        assert_eq!(WizardStep::from_index(2), Some(WizardStep::Processing));
        assert_eq!(WizardStep::from_index(4), None);
        assert_eq!(WizardStep::JobDescription.previous(), None);
        assert_eq!(WizardStep::Results.previous(), Some(WizardStep::Processing));
    }

    #[test]
    fn clamp_score_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(7.2), MAX_SCORE);
        assert_eq!(clamp_score(-1.0), MIN_SCORE);
        assert_eq!(clamp_score(f32::NAN), MIN_SCORE);
        assert_eq!(clamp_score(3.5), 3.5);
    }
}
