//! Model registry persisted in an embedded sled database.
//!
//! Two trees live under the configured database name: `<db>.current_model`
//! holds the single current-model pointer, `<db>.metrics_history` holds one
//! immutable evaluation record per key. History keys come from
//! [`sled::Db::generate_id`], so iteration order is insertion order.

use crate::artifact::ArtifactStore;
use crate::error::{Result, ServingError};
use crate::evaluation::EvaluationReport;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};

const POINTER_KEY: &[u8] = b"current";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentModel {
    pub model_file: String,
}

/// Stored document for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEntry {
    pub model_file: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub report: EvaluationReport,
}

/// A history entry together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub entry: MetricsEntry,
}

#[derive(Clone)]
pub struct Registry {
    db: Db,
    current_model: Tree,
    metrics_history: Tree,
}

impl Registry {
    /// Opens (or creates) the registry database. Fails if the path is
    /// unusable or already locked by another process.
    pub fn open(path: &Path, db_name: &str) -> Result<Self> {
        let db = sled::open(path)?;
        info!(path = %path.display(), db = db_name, "registry opened");
        Self::from_db(db, db_name)
    }

    pub fn from_db(db: Db, db_name: &str) -> Result<Self> {
        let current_model = db.open_tree(format!("{db_name}.current_model"))?;
        let metrics_history = db.open_tree(format!("{db_name}.metrics_history"))?;
        Ok(Self { db, current_model, metrics_history })
    }

    /// The persisted pointer, if one was ever written.
    pub fn stored_current_model(&self) -> Result<Option<String>> {
        match self.current_model.get(POINTER_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice::<CurrentModel>(&bytes)?.model_file)),
            None => Ok(None),
        }
    }

    /// The persisted pointer, else the first artifact in `artifacts`. The
    /// fallback is not written back.
    pub fn current_model(&self, artifacts: &ArtifactStore) -> Result<String> {
        if let Some(model_file) = self.stored_current_model()? { return Ok(model_file); }
        let first = artifacts.first()?;
        debug!(model = %first, "no current model pointer, using first artifact");
        Ok(first)
    }

    pub fn set_current_model(&self, model_file: &str) -> Result<()> {
        let doc = serde_json::to_vec(&CurrentModel { model_file: model_file.to_string() })?;
        self.current_model.insert(POINTER_KEY, doc)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn append_metrics(&self, model_file: &str, report: &EvaluationReport) -> Result<MetricsRecord> {
        let entry = MetricsEntry {
            model_file: model_file.to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            report: report.clone(),
        };
        let id = self.db.generate_id()?;
        self.metrics_history.insert(id.to_be_bytes(), serde_json::to_vec(&entry)?)?;
        self.db.flush()?;
        debug!(id, model = model_file, "metrics appended");
        Ok(MetricsRecord { id: id.to_string(), entry })
    }

    pub fn list_metrics(&self) -> Result<Vec<MetricsRecord>> {
        self.metrics_history.iter().map(|kv| {
            let (key, value) = kv?;
            let raw = <[u8; 8]>::try_from(&key[..]).map_err(|_| ServingError::CorruptKey(key.len()))?;
            Ok(MetricsRecord { id: u64::from_be_bytes(raw).to_string(), entry: serde_json::from_slice(&value)? })
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_registry() -> Registry {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Registry::from_db(db, "test").unwrap()
    }

    fn report(accuracy: f64) -> EvaluationReport {
        EvaluationReport { accuracy, precision: accuracy, recall: accuracy, f1_score: accuracy, confusion_matrix: vec![vec![1, 0], vec![0, 1]] }
    }

    #[test]
    fn set_then_get_returns_value_set() {
        let reg = temp_registry();
        let store = ArtifactStore::new("does-not-matter", "onnx");
        reg.set_current_model("model2.onnx").unwrap();
        assert_eq!(reg.current_model(&store).unwrap(), "model2.onnx");
        reg.set_current_model("model3.onnx").unwrap();
        reg.set_current_model("model3.onnx").unwrap();
        assert_eq!(reg.stored_current_model().unwrap().as_deref(), Some("model3.onnx"));
        assert_eq!(reg.current_model.len(), 1);
    }

    #[test]
    fn empty_registry_falls_back_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["model2.onnx", "model1.onnx"] { std::fs::write(dir.path().join(name), "{}").unwrap(); }
        let reg = temp_registry();
        let store = ArtifactStore::new(dir.path(), "onnx");
        assert_eq!(reg.current_model(&store).unwrap(), "model1.onnx");
        assert_eq!(reg.stored_current_model().unwrap(), None);
    }

    #[test]
    fn append_is_strictly_additive() {
        let reg = temp_registry();
        let first = reg.append_metrics("model1.onnx", &report(0.9)).unwrap();
        let before = reg.list_metrics().unwrap();
        assert_eq!(before, vec![first.clone()]);
        reg.append_metrics("model2.onnx", &report(0.8)).unwrap();
        let after = reg.list_metrics().unwrap();
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[0], first);
        assert_eq!(after[1].entry.model_file, "model2.onnx");
        assert_ne!(after[0].id, after[1].id);
    }

    #[test]
    fn records_serialize_flat_with_string_id() {
        let reg = temp_registry();
        let rec = reg.append_metrics("model1.onnx", &report(0.5)).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["_id"].is_string());
        assert_eq!(json["model_file"], "model1.onnx");
        assert_eq!(json["accuracy"], 0.5);
        assert_eq!(json["confusion_matrix"], serde_json::json!([[1, 0], [0, 1]]));
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn malformed_history_key_is_reported() {
        let reg = temp_registry();
        reg.append_metrics("model1.onnx", &report(0.9)).unwrap();
        let doc = serde_json::to_vec(&reg.list_metrics().unwrap()[0].entry).unwrap();
        reg.metrics_history.insert(b"abc", doc).unwrap();
        assert!(matches!(reg.list_metrics(), Err(ServingError::CorruptKey(3))));
    }

    #[test]
    fn database_name_isolates_collections() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let a = Registry::from_db(db.clone(), "a").unwrap();
        let b = Registry::from_db(db, "b").unwrap();
        a.set_current_model("model1.onnx").unwrap();
        a.append_metrics("model1.onnx", &report(1.0)).unwrap();
        assert_eq!(b.stored_current_model().unwrap(), None);
        assert!(b.list_metrics().unwrap().is_empty());
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let reg = Registry::open(dir.path(), "ml_prototype").unwrap();
            reg.set_current_model("model2.onnx").unwrap();
            reg.append_metrics("model2.onnx", &report(0.7)).unwrap();
        }
        let reg = Registry::open(dir.path(), "ml_prototype").unwrap();
        assert_eq!(reg.stored_current_model().unwrap().as_deref(), Some("model2.onnx"));
        assert_eq!(reg.list_metrics().unwrap().len(), 1);
    }
}
