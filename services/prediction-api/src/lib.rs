//! HTTP surface: predict with the current model, move the pointer, list metrics.
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use iris_core::{ErrorKind, MetricsRecord, ModelLoader, Predictor, Registry, ServingError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

/// Query parameter names, in the order the models expect them.
pub const FEATURE_NAMES: [&str; 4] = ["sepallength", "sepalwidth", "petallength", "petalwidth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species { Setosa, Versicolor, Virginica }

impl Species {
    pub fn from_index(class: usize) -> Option<Self> {
        match class {
            0 => Some(Self::Setosa),
            1 => Some(Self::Versicolor),
            2 => Some(Self::Virginica),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Setosa => "setosa",
            Self::Versicolor => "versicolor",
            Self::Virginica => "virginica",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    registry: Registry,
    loader: ModelLoader,
}

impl AppState {
    pub fn new(registry: Registry, loader: ModelLoader) -> Self { Self { registry, loader } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", get(predict))
        .route("/update_model", post(update_model))
        .route("/metrics", get(metrics))
        .route("/live", get(|| async { Json(serde_json::json!({"live": true})) }))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub species: usize,
    pub species_name: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateModelRequest {
    pub model_file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdateModelResponse {
    pub status: String,
    pub model: String,
}

/// Renders a [`ServingError`] as `{"error": ...}`; only client input maps to 400.
pub struct ApiError(ServingError);

impl From<ServingError> for ApiError {
    fn from(e: ServingError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_client_error() { warn!(error = %self.0, "rejected request"); } else { error!(error = %self.0, kind = ?self.0.kind(), "request failed"); }
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

fn parse_features(params: &HashMap<String, String>) -> Result<Vec<f64>, ServingError> {
    FEATURE_NAMES.iter().map(|name| {
        params.get(*name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .ok_or_else(|| ServingError::client_input("Invalid input"))
    }).collect()
}

/// Runs registry and artifact IO off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServingError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ServingError::Internal(format!("blocking task failed: {e}")).into()),
    }
}

#[instrument(skip_all)]
async fn predict(State(state): State<AppState>, query: Result<Query<HashMap<String, String>>, QueryRejection>) -> Result<Json<PredictResponse>, ApiError> {
    let Query(params) = query.map_err(|_| ServingError::client_input("Invalid input"))?;
    let features = parse_features(&params)?;
    let (model_file, class) = blocking(move || {
        let model_file = state.registry.current_model(state.loader.store())?;
        let model = state.loader.load(&model_file)?;
        let class = model.predict(&[features])?.first().copied()
            .ok_or_else(|| ServingError::Prediction("model returned no prediction".into()))?;
        Ok((model_file, class))
    }).await?;
    let species = Species::from_index(class)
        .ok_or_else(|| ServingError::Prediction(format!("class index {class} has no species label")))?;
    info!(model = %model_file, species = species.name(), "prediction served");
    Ok(Json(PredictResponse { species: class, species_name: species.name().to_string(), model: model_file }))
}

#[instrument(skip_all)]
async fn update_model(State(state): State<AppState>, body: Result<Json<UpdateModelRequest>, JsonRejection>) -> Result<Json<UpdateModelResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ServingError::client_input(e.body_text()))?;
    let model_file = req.model_file.filter(|m| !m.is_empty())
        .ok_or_else(|| ServingError::client_input("No model file provided in the request"))?;
    let stored = model_file.clone();
    blocking(move || state.registry.set_current_model(&stored)).await?;
    info!(model = %model_file, "updated current_model");
    Ok(Json(UpdateModelResponse { status: "model updated".into(), model: model_file }))
}

#[instrument(skip_all)]
async fn metrics(State(state): State<AppState>) -> Result<Json<Vec<MetricsRecord>>, ApiError> {
    let records = blocking(move || state.registry.list_metrics()).await?;
    info!(count = records.len(), "retrieved metrics history");
    Ok(Json(records))
}
