use anyhow::{Context, Result};
use iris_core::{init_tracing, load_config};
use prediction_api::{router, AppState};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("prediction-api")?;
    let cfg = load_config("prediction-api")?;
    info!(?cfg, "config loaded");

    // no degraded mode without the registry
    let registry = cfg.open_registry().context("could not open model registry")?;
    let state = AppState::new(registry, cfg.model_loader());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await.with_context(|| format!("could not bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, models = %cfg.models_dir.display(), "prediction-api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async { let _ = signal::ctrl_c().await; })
        .await?;
    info!("shutdown");
    Ok(())
}
