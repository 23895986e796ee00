//! Filesystem access for model artifacts and the fixed evaluation dataset.
use crate::error::{Result, ServingError};
use crate::model::{Classifier, Predictor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Directory of ONNX classifiers, enumerated in lexicographic order.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { dir: dir.into(), extension: extension.into() }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Artifact file names carrying the configured extension. A missing
    /// directory counts as empty.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ServingError::NoArtifactsFound(self.dir.clone())),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() { continue; }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) { continue; }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) { names.push(name.to_string()); }
        }
        names.sort();
        Ok(names)
    }

    pub fn first(&self) -> Result<String> {
        self.list()?.into_iter().next().ok_or_else(|| ServingError::NoArtifactsFound(self.dir.clone()))
    }

    /// Resolves an artifact id to its path; ids must be bare file names.
    pub fn path_of(&self, artifact_id: &str) -> Result<PathBuf> {
        let path = self.dir.join(artifact_id);
        if artifact_id.is_empty() || Path::new(artifact_id).file_name().and_then(|n| n.to_str()) != Some(artifact_id) {
            return Err(ServingError::ArtifactNotFound(path));
        }
        Ok(path)
    }

    pub fn load(&self, artifact_id: &str) -> Result<Classifier> {
        let path = self.path_of(artifact_id)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(path = %path.display(), "model file not found");
                return Err(ServingError::ArtifactNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };
        let model = Classifier::from_onnx(&bytes)
            .map_err(|e| ServingError::InvalidArtifact { path: path.clone(), reason: format!("{e:#}") })?;
        debug!(artifact = artifact_id, features = model.n_features(), "artifact loaded");
        Ok(model)
    }
}

/// Feature matrix and label vector used to score a candidate model.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl TestDataset {
    pub fn load(features_path: &Path, labels_path: &Path) -> Result<Self> {
        for p in [features_path, labels_path] {
            if !p.exists() { return Err(ServingError::TestDataNotFound(p.to_path_buf())); }
        }
        Ok(Self { features: read_json(features_path)?, labels: read_json(labels_path)? })
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ServingError::InvalidTestData { path: path.to_path_buf(), reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const CENTROID: &[u8] = include_bytes!("../tests/fixtures/pair_centroid.onnx");

    fn store_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files { std::fs::write(dir.path().join(name), body).unwrap(); }
        let store = ArtifactStore::new(dir.path(), "onnx");
        (dir, store)
    }

    #[test]
    fn list_is_sorted_and_filtered_by_extension() {
        let (_dir, store) = store_with(&[("model2.onnx", CENTROID), ("model1.onnx", CENTROID), ("notes.txt", &b"x"[..])]);
        assert_eq!(store.list().unwrap(), vec!["model1.onnx", "model2.onnx"]);
        assert_eq!(store.first().unwrap(), "model1.onnx");
    }

    #[test]
    fn missing_or_empty_directory_has_no_artifacts() {
        let (dir, store) = store_with(&[]);
        assert!(matches!(store.first(), Err(ServingError::NoArtifactsFound(_))));
        let gone = ArtifactStore::new(dir.path().join("nope"), "onnx");
        assert!(matches!(gone.list(), Err(ServingError::NoArtifactsFound(_))));
    }

    #[test]
    fn load_missing_artifact_is_not_found() {
        let (_dir, store) = store_with(&[("model1.onnx", CENTROID)]);
        let err = store.load("model9.onnx").unwrap_err();
        assert!(matches!(err, ServingError::ArtifactNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let (_dir, store) = store_with(&[("model1.onnx", CENTROID)]);
        for id in ["../model1.onnx", "sub/model1.onnx", "", ".."] {
            assert!(matches!(store.load(id), Err(ServingError::ArtifactNotFound(_))), "{id}");
        }
    }

    #[test]
    fn undecodable_artifact_is_invalid() {
        let scores_only: &[u8] = include_bytes!("../tests/fixtures/iris_scores.onnx");
        let (_dir, store) = store_with(&[("broken.onnx", &b"{not onnx"[..]), ("scores.onnx", scores_only), ("model1.onnx", CENTROID)]);
        assert!(matches!(store.load("broken.onnx"), Err(ServingError::InvalidArtifact { .. })));
        assert!(matches!(store.load("scores.onnx"), Err(ServingError::InvalidArtifact { .. })));
        assert_eq!(store.load("model1.onnx").unwrap().n_features(), 2);
    }

    #[test]
    fn test_dataset_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("test-data.json");
        let labels = dir.path().join("test-labels.json");
        std::fs::write(&features, "[[0.1,0.2],[0.9,1.1]]").unwrap();
        assert!(matches!(TestDataset::load(&features, &labels), Err(ServingError::TestDataNotFound(p)) if p == labels));
        std::fs::write(&labels, "[0,1]").unwrap();
        let data = TestDataset::load(&features, &labels).unwrap();
        assert_eq!(data.features.len(), 2);
        assert_eq!(data.labels, vec![0, 1]);
    }
}
