// src/ingest/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{ScheduleConfig, MAX_INTERVAL_HOURS};
use crate::pipeline::Pipeline;

/// Spawn the periodic trigger: one `run_once` every `interval_hours`.
/// Runs never overlap; the pipeline's run lock serializes them with HTTP triggers.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, cfg: ScheduleConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.interval_hours.clamp(1, MAX_INTERVAL_HOURS) * 3_600);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        if !cfg.run_on_start {
            // first tick completes immediately
            ticker.tick().await;
        }
        loop {
            ticker.tick().await;
            counter!("radar_scheduled_runs_total").increment(1);
            match pipeline.run_once().await {
                Ok(summary) => {
                    tracing::info!(target: "scheduler", new = summary.new_items, "{summary}");
                }
                Err(e) => {
                    tracing::error!(target: "scheduler", error = %e, "scheduled run failed");
                }
            }
            tracing::info!(
                target: "scheduler",
                next_in_hours = cfg.interval_hours,
                "waiting for next run"
            );
        }
    })
}
