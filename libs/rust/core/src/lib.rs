//! Core shared pieces of the iris model-serving services.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the process-wide subscriber once. `RUST_LOG` drives filtering
/// (default `info`); `IRIS_JSON_LOG=1` switches to JSON lines.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("IRIS_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false));
        let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true));
        tracing_subscriber::registry().with(env_filter).with(json_layer).with(text_layer).try_init()?;
        Ok(())
    })?;
    info!(target: "iris", service, "tracing initialized");
    Ok(())
}

pub mod artifact;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod registry;
pub mod retrain;

pub use artifact::{ArtifactStore, TestDataset};
pub use config::{load_config, ServiceConfig};
pub use error::{ErrorKind, ServingError};
pub use evaluation::{ConfusionMatrix, EvaluationReport};
pub use model::{Classifier, ModelLoader, Predictor};
pub use registry::{CurrentModel, MetricsEntry, MetricsRecord, Registry};
pub use retrain::{retrain, RetrainOutcome};

impl ServiceConfig {
    pub fn artifact_store(&self) -> ArtifactStore { ArtifactStore::new(&self.models_dir, &self.artifact_extension) }

    pub fn model_loader(&self) -> ModelLoader {
        if self.cache_models { ModelLoader::with_cache(self.artifact_store()) } else { ModelLoader::new(self.artifact_store()) }
    }

    /// Opens the registry; callers treat failure as fatal.
    pub fn open_registry(&self) -> Result<Registry, ServingError> { Registry::open(&self.registry_path, &self.db_name) }
}
