pub mod domain;
pub mod ports;
pub mod ranking;
pub mod steps;
pub mod store;
pub mod validation;

pub use domain::{
    CandidateInfo, Document, DocumentPatch, DocumentStatus, EvaluationResult, InfoPage,
    JobDescription, ScoreBreakdown, View, WizardState, WizardStep,
};
pub use ports::{
    BatchId, CandidateScorer, DocumentStorage, EvaluationPipeline, PortError, PortResult,
    ProcessingPhase, ProcessingStatus, Report, ReportFormat, UploadMetadata,
};
pub use steps::{ProcessingRequest, StepController, StepError};
pub use store::{StoreError, WizardAction, WizardStore};
pub use validation::{UploadPolicy, ValidationError};
