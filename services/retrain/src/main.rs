use anyhow::{Context, Result};
use iris_core::{init_tracing, load_config, retrain};
use tracing::info;

fn main() -> Result<()> {
    init_tracing("retrain")?;
    let cfg = load_config("retrain")?;
    info!(?cfg, "config loaded");

    // the registry lock is exclusive, so this fails while the API holds it
    let registry = cfg.open_registry().context("could not open model registry")?;
    let loader = cfg.model_loader();
    let outcome = retrain(&registry, &loader, &cfg.test_features, &cfg.test_labels, &mut rand::thread_rng())
        .context("retrain failed")?;
    info!(
        previous = outcome.previous.as_deref().unwrap_or("<none>"),
        current = %outcome.selected,
        accuracy = outcome.record.entry.report.accuracy,
        precision = outcome.record.entry.report.precision,
        recall = outcome.record.entry.report.recall,
        f1 = outcome.record.entry.report.f1_score,
        "retrain complete"
    );
    Ok(())
}
