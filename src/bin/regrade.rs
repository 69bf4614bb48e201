//! Regrade the favorites collection with interests learned from it.

use anyhow::Context;
use tech_radar::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tech_radar::init_tracing();

    let config = PipelineConfig::load_default().context("loading pipeline config")?;
    let pipeline = Pipeline::from_config(config)?;
    let regraded = pipeline.regrade_favorites().await?;

    println!("Regraded {regraded} favorites.");
    Ok(())
}
