//! One pipeline run from the command line; prints the summary line.

use anyhow::Context;
use tech_radar::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tech_radar::init_tracing();

    let config = PipelineConfig::load_default().context("loading pipeline config")?;
    let pipeline = Pipeline::from_config(config)?;
    let summary = pipeline.run_once().await?;

    println!("{summary}");
    Ok(())
}
