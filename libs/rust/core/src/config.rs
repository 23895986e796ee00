//! Layered service configuration: defaults, optional file, `IRIS_*` environment.
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "IRIS";
pub const CONFIG_FILE_ENV: &str = "IRIS_CONFIG_FILE";

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    /// Directory of the embedded registry database.
    pub registry_path: PathBuf,
    pub db_name: String,
    pub models_dir: PathBuf,
    pub artifact_extension: String,
    pub test_features: PathBuf,
    pub test_labels: PathBuf,
    pub bind_addr: String,
    pub cache_models: bool,
}

pub fn load_config(service: &str) -> Result<ServiceConfig> {
    let file = std::env::var(CONFIG_FILE_ENV).ok();
    build_config(service, file.as_deref(), config::Environment::with_prefix(ENV_PREFIX))
}

fn build_config(service: &str, file: Option<&str>, env: config::Environment) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("registry_path", "./data/registry")?
        .set_default("db_name", "ml_prototype")?
        .set_default("models_dir", "models")?
        .set_default("artifact_extension", "onnx")?
        .set_default("test_features", "data/test-data.json")?
        .set_default("test_labels", "data/test-labels.json")?
        .set_default("bind_addr", "0.0.0.0:5000")?
        .set_default("cache_models", false)?;
    if let Some(file) = file {
        builder = builder.add_source(config::File::with_name(file).required(false));
    }
    builder = builder.add_source(env.prefix_separator("_").separator("__").try_parsing(true));
    let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
    tracing::debug!(service, registry = %cfg.registry_path.display(), db = %cfg.db_name, "config resolved");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let cfg = build_config("prediction-api", None, env_from(&[])).unwrap();
        assert_eq!(cfg.service_name, "prediction-api");
        assert_eq!(cfg.db_name, "ml_prototype");
        assert_eq!(cfg.models_dir, PathBuf::from("models"));
        assert_eq!(cfg.artifact_extension, "onnx");
        assert!(!cfg.cache_models);
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = build_config("retrain", None, env_from(&[
            ("IRIS_DB_NAME", "staging"),
            ("IRIS_REGISTRY_PATH", "/var/lib/iris"),
            ("IRIS_CACHE_MODELS", "true"),
        ])).unwrap();
        assert_eq!(cfg.db_name, "staging");
        assert_eq!(cfg.registry_path, PathBuf::from("/var/lib/iris"));
        assert!(cfg.cache_models);
    }

    #[test]
    fn file_layer_sits_below_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iris.yaml");
        std::fs::write(&path, "db_name: from_file\nmodels_dir: /srv/models\n").unwrap();
        let cfg = build_config("retrain", path.to_str(), env_from(&[("IRIS_DB_NAME", "from_env")])).unwrap();
        assert_eq!(cfg.db_name, "from_env");
        assert_eq!(cfg.models_dir, PathBuf::from("/srv/models"));
    }
}
