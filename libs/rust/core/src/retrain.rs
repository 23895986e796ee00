//! Rotates the current model to a different artifact and records its scores.
use crate::artifact::TestDataset;
use crate::error::{Result, ServingError};
use crate::model::{ModelLoader, Predictor};
use crate::registry::{MetricsRecord, Registry};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub previous: Option<String>,
    pub selected: String,
    pub record: MetricsRecord,
}

/// Picks a random artifact other than the current one, evaluates it on the
/// fixed test set, appends the metrics and only then moves the pointer.
/// Assumes no other retrain runs concurrently.
pub fn retrain<R: Rng + ?Sized>(registry: &Registry, loader: &ModelLoader, features: &Path, labels: &Path, rng: &mut R) -> Result<RetrainOutcome> {
    let previous = match registry.current_model(loader.store()) {
        Ok(current) => Some(current),
        Err(e) => { warn!(error = %e, "current model unknown, considering every artifact"); None }
    };

    let mut candidates = loader.store().list()?;
    if candidates.is_empty() { return Err(ServingError::NoArtifactsFound(loader.store().dir().to_path_buf())); }
    if let Some(current) = &previous {
        candidates.retain(|c| c != current);
        if candidates.is_empty() { return Err(ServingError::NoAlternativeArtifact { current: current.clone() }); }
    }
    let selected = candidates.choose(rng).cloned().ok_or_else(|| ServingError::NoArtifactsFound(loader.store().dir().to_path_buf()))?;
    info!(previous = ?previous, selected = %selected, candidates = candidates.len(), "candidate selected");

    let dataset = TestDataset::load(features, labels)?;
    let model = loader.load(&selected)?;
    let report = model.evaluate(&dataset.features, &dataset.labels)?;

    let record = registry.append_metrics(&selected, &report)?;
    registry.set_current_model(&selected)?;
    info!(model = %selected, accuracy = report.accuracy, f1 = report.f1_score, "current model rotated");
    Ok(RetrainOutcome { previous, selected, record })
}
