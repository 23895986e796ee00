//! Dumps both registry collections as pretty JSON.
use anyhow::{Context, Result};
use iris_core::{init_tracing, load_config, CurrentModel};

fn main() -> Result<()> {
    init_tracing("print-registry")?;
    let cfg = load_config("print-registry")?;
    let registry = cfg.open_registry().context("could not open model registry")?;

    let pointer: Vec<CurrentModel> = registry.stored_current_model()?.into_iter().map(|model_file| CurrentModel { model_file }).collect();
    println!("\ncollection '{}.current_model':", cfg.db_name);
    println!("{}", serde_json::to_string_pretty(&pointer)?);

    println!("\ncollection '{}.metrics_history':", cfg.db_name);
    println!("{}", serde_json::to_string_pretty(&registry.list_metrics()?)?);
    Ok(())
}
