// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use tech_radar::analyze::llm::ScriptedClient;
use tech_radar::config::{PipelineConfig, SourceEntry};
use tech_radar::ingest::FixtureFetcher;
use tech_radar::metrics::Metrics;
use tech_radar::model::RawContent;
use tech_radar::storage::MemoryBlobStore;
use tech_radar::venue::VenueAuthority;
use tech_radar::Pipeline;

// The recorder is process-global, so everything lives in one test.
#[tokio::test]
async fn metrics_endpoint_exposes_run_series() {
    let metrics = Metrics::init(6).expect("install recorder");

    let fetcher = FixtureFetcher::new();
    fetcher.set("https://blogs.nvidia.com/", RawContent::page("<p>GPU launch</p>"));
    let config = PipelineConfig {
        sources: vec![
            SourceEntry::Url("https://blogs.nvidia.com/".into()),
            SourceEntry::Url("https://down.example.com/".into()),
        ],
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(
        config,
        Arc::new(fetcher),
        Arc::new(ScriptedClient::always(
            r#"[{"title":"GPU","link":"https://blogs.nvidia.com/gpu","ai_score":50}]"#,
        )),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(VenueAuthority::default_seed()),
    );
    pipeline.run_once().await.unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "radar_sources_fetched_total 1",
        "radar_fetch_errors_total 1",
        "radar_llm_calls_total 1",
        "radar_new_items_total 1",
        "radar_run_ms",
        "radar_last_run_ts",
        "radar_schedule_interval_hours 6",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
