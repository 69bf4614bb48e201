// src/ingest/arxiv.rs
//! Paginated arxiv listing via the Atom query API.
//!
//! Pages are requested newest-first and sequentially. Pagination stops at the first
//! entry older than the cutoff window, on an empty page, or at `max_items`.
//! Every kept entry is rendered as a synthetic `<article>` block so the extractor can
//! batch them.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Mutex;

use crate::config::{ArxivConfig, MAX_CUTOFF_DAYS};
use crate::error::{PipelineError, Result};
use crate::model::RawContent;
use crate::venue::VenueAuthority;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "journal_ref", alias = "arxiv:journal_ref", default)]
    journal_ref: Option<String>,
    #[serde(rename = "comment", alias = "arxiv:comment", default)]
    comment: Option<String>,
}

/// One listing entry after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivEntry {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    /// `Journal: … | Comment: …`, empty when the entry has neither.
    pub venue: String,
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse one Atom page.
pub fn parse_atom_page(xml: &str) -> anyhow::Result<Vec<ArxivEntry>> {
    let t0 = std::time::Instant::now();
    let feed: Feed = from_str(xml).context("parsing arxiv atom feed")?;

    let entries = feed
        .entries
        .into_iter()
        .map(|e| {
            let mut venue = Vec::new();
            if let Some(j) = e.journal_ref.as_deref().map(squash).filter(|s| !s.is_empty()) {
                venue.push(format!("Journal: {j}"));
            }
            if let Some(c) = e.comment.as_deref().map(squash).filter(|s| !s.is_empty()) {
                venue.push(format!("Comment: {c}"));
            }
            ArxivEntry {
                title: squash(&e.title),
                summary: squash(&e.summary),
                link: e.id.trim().to_string(),
                published: e
                    .published
                    .as_deref()
                    .and_then(|p| DateTime::parse_from_rfc3339(p.trim()).ok())
                    .map(|d| d.with_timezone(&Utc)),
                venue: venue.join(" | "),
            }
        })
        .collect();

    histogram!("radar_arxiv_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

pub fn page_url(api_base: &str, category: &str, start: usize, size: usize) -> String {
    format!(
        "{api_base}?search_query=cat:{category}&sortBy=submittedDate&sortOrder=descending&start={start}&max_results={size}"
    )
}

/// Source of raw Atom pages.
#[async_trait]
pub trait FeedPager: Send + Sync {
    async fn page(&self, start: usize, size: usize) -> anyhow::Result<String>;
    /// Identifier used in errors and logs.
    fn label(&self) -> String;
}

pub struct HttpPager {
    client: reqwest::Client,
    api_base: String,
    category: String,
}

impl HttpPager {
    pub fn new(client: reqwest::Client, api_base: &str, category: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            category: category.to_string(),
        }
    }
}

#[async_trait]
impl FeedPager for HttpPager {
    async fn page(&self, start: usize, size: usize) -> anyhow::Result<String> {
        let url = page_url(&self.api_base, &self.category, start, size);
        let resp = self.client.get(&url).send().await.context("arxiv request")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("arxiv api returned {status}");
        }
        resp.text().await.context("arxiv body")
    }

    fn label(&self) -> String {
        format!("arxiv:{}", self.category)
    }
}

/// Pages served from memory; `None` simulates a failed request. Records requested offsets.
pub struct FixturePager {
    pages: Vec<Option<String>>,
    requested: Mutex<Vec<usize>>,
}

impl FixturePager {
    pub fn new(pages: Vec<Option<String>>) -> Self {
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FeedPager for FixturePager {
    async fn page(&self, start: usize, size: usize) -> anyhow::Result<String> {
        if let Ok(mut log) = self.requested.lock() {
            log.push(start);
        }
        let idx = start / size.max(1);
        match self.pages.get(idx) {
            Some(Some(xml)) => Ok(xml.clone()),
            Some(None) => anyhow::bail!("fixture page {idx} unavailable"),
            None => Ok("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>".to_string()),
        }
    }

    fn label(&self) -> String {
        "arxiv:fixture".to_string()
    }
}

/// Walk pages until a stop condition. A failed first page is a fetch error; a failed
/// later page ends pagination with what was already collected.
pub async fn collect_entries(
    pager: &dyn FeedPager,
    cfg: &ArxivConfig,
    now: DateTime<Utc>,
) -> Result<Vec<ArxivEntry>> {
    let size = cfg.page_size.max(1);
    let cutoff = now - Duration::days(cfg.cutoff_days.clamp(1, MAX_CUTOFF_DAYS));
    let mut out: Vec<ArxivEntry> = Vec::new();
    let mut start = 0usize;

    loop {
        if start > 0 && cfg.page_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(cfg.page_delay_ms)).await;
        }

        let page = match pager.page(start, size).await.and_then(|xml| parse_atom_page(&xml)) {
            Ok(p) => p,
            Err(e) if start == 0 => return Err(PipelineError::fetch(&pager.label(), format!("{e:#}"))),
            Err(e) => {
                tracing::warn!(source = %pager.label(), start, error = %format!("{e:#}"), "arxiv page failed; keeping collected entries");
                break;
            }
        };
        if page.is_empty() {
            break;
        }

        let mut reached_cutoff = false;
        for entry in page {
            if entry.published.is_some_and(|p| p < cutoff) {
                reached_cutoff = true;
                continue;
            }
            out.push(entry);
        }

        if out.len() >= cfg.max_items {
            out.truncate(cfg.max_items);
            break;
        }
        if reached_cutoff {
            break;
        }
        start += size;
    }

    tracing::debug!(source = %pager.label(), count = out.len(), pages = start / size + 1, "arxiv listing collected");
    Ok(out)
}

/// Synthetic markup for one entry; the venue is annotated with its tier tag.
pub fn entry_markup(entry: &ArxivEntry, venues: &VenueAuthority) -> String {
    let venue = if entry.venue.is_empty() {
        String::new()
    } else {
        venues.annotate(&entry.venue)
    };
    let date = entry
        .published
        .map(|d| d.to_rfc3339())
        .unwrap_or_default();
    format!(
        "<article><h2>{}</h2><p>Date: {}</p><p>Venue: {}</p><a href='{}'>Paper Link</a><div>{}</div></article>",
        html_escape::encode_text(&entry.title),
        date,
        html_escape::encode_text(&venue),
        html_escape::encode_single_quoted_attribute(&entry.link),
        html_escape::encode_text(&entry.summary),
    )
}

/// Fetch the whole listing as `RawContent` (one entry string per paper).
pub async fn fetch_listing(
    pager: &dyn FeedPager,
    cfg: &ArxivConfig,
    venues: &VenueAuthority,
    now: DateTime<Utc>,
) -> Result<RawContent> {
    let entries = collect_entries(pager, cfg, now).await?;
    let blocks: Vec<String> = entries.iter().map(|e| entry_markup(e, venues)).collect();
    let markup = format!(
        "<html><body><h1>{} recent papers</h1>{}</body></html>",
        html_escape::encode_text(&pager.label()),
        blocks.join("<hr/>")
    );
    Ok(RawContent {
        markup,
        entries: blocks,
    })
}
