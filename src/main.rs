//! Tech radar service: HTTP trigger surface, collection reads, Prometheus metrics and
//! the periodic scheduler, running under Shuttle.

use shuttle_axum::ShuttleAxum;
use std::sync::Arc;

use tech_radar::config::PipelineConfig;
use tech_radar::ingest::scheduler::spawn_scheduler;
use tech_radar::metrics::Metrics;
use tech_radar::pipeline::Pipeline;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    tech_radar::init_tracing();

    let config = PipelineConfig::load_default()?;
    let metrics = Metrics::init(config.schedule.interval_hours)?;

    let schedule = config.schedule.clone();
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    spawn_scheduler(pipeline.clone(), schedule);

    let router = tech_radar::router(pipeline).merge(metrics.router());
    Ok(router.into())
}
