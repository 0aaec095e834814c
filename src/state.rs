use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::model::{Scorer, ScoringModel};

/// Shared per-process state, built once at startup and cloned into each
/// request handler. Nothing here mutates after construction.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub scorer: Option<Arc<dyn Scorer>>,
}

impl AppState {
    /// Attempt the model load exactly once. A missing or unreadable model
    /// file leaves the service running in degraded mode: health reports
    /// `model_loaded: false` and scoring requests are rejected.
    pub fn new(config: Config) -> Self {
        let scorer: Option<Arc<dyn Scorer>> =
            match ScoringModel::load(Path::new(&config.system.model_path)) {
                Ok(model) => {
                    info!("Model loaded successfully from {}", config.system.model_path);
                    Some(Arc::new(model))
                }
                Err(e) => {
                    warn!("Model not loaded ({e:#}); scoring requests will be rejected");
                    None
                }
            };

        Self { config, scorer }
    }

    /// State with an explicitly injected scorer (or none), for tests and
    /// alternative inference backends.
    pub fn with_scorer(config: Config, scorer: Option<Arc<dyn Scorer>>) -> Self {
        Self { config, scorer }
    }

    pub fn model_loaded(&self) -> bool {
        self.scorer.is_some()
    }
}
