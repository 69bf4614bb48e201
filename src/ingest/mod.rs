// src/ingest/mod.rs
//! Fetcher: turns a configured `Source` into `RawContent`.
//!
//! Three source families:
//! - plain web pages (browser-like headers, optional per-domain cookie),
//! - data-endpoint destinations (URL rewrite + JSON payload unwrap),
//! - the paginated arxiv API (see `arxiv`).
//!
//! Single attempt per request; the pipeline retries on the next run.

pub mod arxiv;
pub mod scheduler;

use async_trait::async_trait;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::{ArxivConfig, FetchConfig};
use crate::error::{PipelineError, Result};
use crate::model::{DataEndpointRule, RawContent, Source, SourceKind};
use crate::venue::VenueAuthority;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_sources_fetched_total", "Sources fetched successfully.");
        describe_counter!(
            "radar_sources_unchanged_total",
            "Sources skipped because their fingerprint did not change."
        );
        describe_counter!("radar_fetch_errors_total", "Fetch failures (network, status, parse).");
        describe_counter!("radar_llm_calls_total", "Extraction and regrade model calls.");
        describe_counter!(
            "radar_extract_failures_total",
            "Batches whose model call or response parsing failed."
        );
        describe_counter!("radar_new_items_total", "Items that passed the seen-link gate.");
        describe_counter!(
            "radar_persist_errors_total",
            "Categories whose history could not be read or written."
        );
        describe_histogram!("radar_run_ms", "Wall time of one pipeline run in milliseconds.");
        describe_histogram!("radar_arxiv_parse_ms", "Atom page parse time in milliseconds.");
        describe_gauge!("radar_last_run_ts", "Unix ts when the pipeline last finished a run.");
    });
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<RawContent>;
}

pub type DynFetcher = Arc<dyn ContentFetcher>;

// ------------------------------------------------------------
// Credentials
// ------------------------------------------------------------

/// `domain substring → cookie`; the longest matching domain wins.
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    entries: Vec<(String, String)>,
}

impl CredentialTable {
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = map
            .iter()
            .filter(|(d, c)| !d.trim().is_empty() && !c.trim().is_empty())
            .map(|(d, c)| (d.trim().to_string(), c.trim().to_string()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    pub fn cookie_for(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(domain, _)| url.contains(domain.as_str()))
            .map(|(_, cookie)| cookie.as_str())
    }
}

// ------------------------------------------------------------
// Data-endpoint rule
// ------------------------------------------------------------

/// `<url-without-query>?<data_query>`, unless the URL already targets the data route.
pub fn data_endpoint_url(url: &str, rule: &DataEndpointRule) -> String {
    if url.contains("_data") {
        return url.to_string();
    }
    let base = url.split('?').next().unwrap_or(url);
    format!("{base}?{}", rule.data_query)
}

/// Unwrap the payload object into minimal markup; anything else passes through.
pub fn unwrap_data_payload(body: &str, rule: &DataEndpointRule) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    let Some(article) = value.get(&rule.payload_key) else {
        return body.to_string();
    };
    let field = |k: &str| article.get(k).and_then(|v| v.as_str()).unwrap_or_default();
    format!(
        "<h1>{}</h1><p>Date: {}</p><div>{}</div>",
        field("title"),
        field("publishedDate"),
        field("content")
    )
}

// ------------------------------------------------------------
// HTTP fetcher
// ------------------------------------------------------------

pub struct HttpFetcher {
    client: reqwest::Client,
    credentials: CredentialTable,
    arxiv: ArxivConfig,
    venues: Arc<VenueAuthority>,
}

impl HttpFetcher {
    pub fn new(
        fetch: &FetchConfig,
        credentials: &BTreeMap<String, String>,
        arxiv: ArxivConfig,
        venues: Arc<VenueAuthority>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(fetch.user_agent.clone())
            .timeout(Duration::from_secs(fetch.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            credentials: CredentialTable::from_map(credentials),
            arxiv,
            venues,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let mut req = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::REFERER, "https://www.google.com/");
        if let Some(cookie) = self.credentials.cookie_for(url) {
            tracing::debug!(url, "using configured cookie");
            req = req.header(reqwest::header::COOKIE, cookie);
        }

        let resp = req.send().await.map_err(|e| PipelineError::fetch(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::fetch(url, format!("status {status}")));
        }
        resp.text().await.map_err(|e| PipelineError::fetch(url, e))
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<RawContent> {
        match &source.kind {
            SourceKind::Web => self.get_text(&source.url).await.map(RawContent::page),
            SourceKind::DataEndpoint(rule) => {
                let url = data_endpoint_url(&source.url, rule);
                self.get_text(&url)
                    .await
                    .map(|body| RawContent::page(unwrap_data_payload(&body, rule)))
            }
            SourceKind::Arxiv { category } => {
                let pager = arxiv::HttpPager::new(
                    self.client.clone(),
                    &self.arxiv.api_base,
                    category,
                );
                arxiv::fetch_listing(&pager, &self.arxiv, &self.venues, chrono::Utc::now())
                    .await
            }
        }
    }
}

// ------------------------------------------------------------
// Fixture fetcher
// ------------------------------------------------------------

/// In-memory fetcher for tests and dry runs. URLs without a page fail like a network error.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: RwLock<HashMap<String, RawContent>>,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, content: RawContent) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.to_string(), content);
        }
    }

    pub fn remove(&self, url: &str) {
        if let Ok(mut pages) = self.pages.write() {
            pages.remove(url);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for FixtureFetcher {
    async fn fetch(&self, source: &Source) -> Result<RawContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pages = self
            .pages
            .read()
            .map_err(|_| PipelineError::fetch(&source.url, "fixture lock poisoned"))?;
        pages
            .get(&source.url)
            .cloned()
            .ok_or_else(|| PipelineError::fetch(&source.url, "no fixture page"))
    }
}
