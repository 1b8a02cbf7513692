//! services/wizard/src/web/state.rs
//!
//! Shared state of the reference backend.

use crate::config::Config;
use skilllens_core::ports::EvaluationPipeline;
use std::sync::Arc;

/// Created once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<dyn EvaluationPipeline>,
    pub config: Arc<Config>,
}
