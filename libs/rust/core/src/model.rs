//! Predictor abstraction, ONNX-backed classifiers, and the loader.
use crate::artifact::ArtifactStore;
use crate::error::{Result, ServingError};
use crate::evaluation::EvaluationReport;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tract_onnx::prelude::*;
use tract_onnx::tract_core::internal::DimLike;

pub trait Predictor {
    fn n_features(&self) -> usize;

    fn predict_row(&self, row: &[f64]) -> Result<usize>;

    /// One class index per row. Every row must match `n_features` and hold
    /// only finite values.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>> {
        rows.iter().map(|row| {
            if row.len() != self.n_features() {
                return Err(ServingError::Prediction(format!("expected {} features, got {}", self.n_features(), row.len())));
            }
            if row.iter().any(|x| !x.is_finite()) {
                return Err(ServingError::Prediction("input contains NaN or infinity".into()));
            }
            self.predict_row(row)
        }).collect()
    }

    fn evaluate(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<EvaluationReport> {
        if features.is_empty() || labels.is_empty() {
            return Err(ServingError::Prediction("evaluation requires a non-empty dataset".into()));
        }
        if features.len() != labels.len() {
            return Err(ServingError::Prediction(format!("{} feature rows but {} labels", features.len(), labels.len())));
        }
        let predictions = self.predict(features)?;
        Ok(EvaluationReport::from_predictions(labels, &predictions))
    }
}

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An optimized ONNX graph taking `[batch, n_features]` f32 rows and
/// producing int64 class labels on its first output.
#[derive(Debug)]
pub struct Classifier {
    plan: Plan,
    n_features: usize,
}

impl Classifier {
    /// Parses and optimizes an ONNX model, checking its input and output
    /// signature once so inference only fails on bad rows.
    pub fn from_onnx(bytes: &[u8]) -> anyhow::Result<Self> {
        let model = tract_onnx::onnx().model_for_read(&mut &bytes[..])?.into_optimized()?;
        let input = model.input_fact(0)?;
        if input.datum_type != f32::datum_type() {
            anyhow::bail!("input must be f32, found {:?}", input.datum_type);
        }
        if input.rank() != 2 {
            anyhow::bail!("input must be [batch, features], found rank {}", input.rank());
        }
        let n_features = input.shape[1].to_usize()?;
        let output = model.output_fact(0)?;
        if output.datum_type != i64::datum_type() {
            anyhow::bail!("first output must hold int64 class labels, found {:?}", output.datum_type);
        }
        Ok(Self { plan: model.into_runnable()?, n_features })
    }
}

fn inference_error(e: anyhow::Error) -> ServingError { ServingError::Prediction(format!("{e:#}")) }

impl Predictor for Classifier {
    fn n_features(&self) -> usize { self.n_features }

    fn predict_row(&self, row: &[f64]) -> Result<usize> {
        let input: Vec<f32> = row.iter().map(|&x| x as f32).collect();
        if input.iter().any(|x| !x.is_finite()) {
            return Err(ServingError::Prediction("feature value outside f32 range".into()));
        }
        let tensor = Tensor::from_shape(&[1, input.len()], &input).map_err(inference_error)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(inference_error)?;
        let labels = outputs.first().ok_or_else(|| ServingError::Prediction("model produced no output".into()))?;
        let label = labels.to_array_view::<i64>().map_err(inference_error)?.iter().next().copied()
            .ok_or_else(|| ServingError::Prediction("model returned no label".into()))?;
        usize::try_from(label).map_err(|_| ServingError::Prediction(format!("negative class label {label}")))
    }
}

/// Loads predictors from an [`ArtifactStore`], optionally through a
/// read-through cache keyed by artifact id.
#[derive(Clone)]
pub struct ModelLoader {
    store: ArtifactStore,
    cache: Option<Arc<ModelCache>>,
}

#[derive(Default)]
struct ModelCache {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<Classifier>>>>>,
}

impl ModelLoader {
    pub fn new(store: ArtifactStore) -> Self { Self { store, cache: None } }

    pub fn with_cache(store: ArtifactStore) -> Self { Self { store, cache: Some(Arc::new(ModelCache::default())) } }

    pub fn store(&self) -> &ArtifactStore { &self.store }

    pub fn load(&self, artifact_id: &str) -> Result<Arc<Classifier>> {
        let Some(cache) = &self.cache else { return self.store.load(artifact_id).map(Arc::new) };
        let slot = cache.slots.lock().entry(artifact_id.to_string()).or_default().clone();
        // the map lock is released here; concurrent loaders of one id wait on the cell instead
        let loaded = slot.get_or_try_init(|| {
            info!(artifact = artifact_id, "loading artifact into cache");
            self.store.load(artifact_id).map(Arc::new)
        });
        match loaded {
            Ok(model) => {
                debug!(artifact = artifact_id, "artifact served from cache");
                Ok(model.clone())
            }
            Err(e) => {
                let mut slots = cache.slots.lock();
                if slots.get(artifact_id).is_some_and(|s| Arc::ptr_eq(s, &slot) && s.get().is_none()) {
                    slots.remove(artifact_id);
                }
                warn!(artifact = artifact_id, error = %e, "artifact load failed, slot dropped");
                Err(e)
            }
        }
    }
}
