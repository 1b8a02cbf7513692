//! services/wizard/src/error.rs
//!
//! Defines the primary error type for the wizard service.

use crate::config::ConfigError;
use skilllens_core::ports::PortError;
use skilllens_core::steps::StepError;
use skilllens_core::validation::ValidationError;

/// The primary error type for the `wizard` service.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transition or mutation refused by the step controller.
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    /// Represents an error that propagated up from the evaluation pipeline.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PortError),

    /// A report was requested before any batch finished.
    #[error("No evaluated batch is available")]
    NoResults,

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<ValidationError> for WizardError {
    fn from(err: ValidationError) -> Self {
        WizardError::Step(StepError::Validation(err))
    }
}
