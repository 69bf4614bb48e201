//! Orchestration of one run:
//! fetch → clean → fingerprint gate → extract → venue floor + score → dedupe → rank →
//! persist collections → mark seen → persist state.
//!
//! Sources are processed sequentially in configuration order. State is loaded once at
//! the start and written once at the end; the run lock keeps runs from overlapping.
//! Page hashes and seen links of a category are only committed once that category's
//! history write succeeded, so a failed write is retried instead of losing items.

use metrics::{counter, gauge, histogram};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::analyze::extract::extract_source;
use crate::analyze::llm::{build_client, DynLlmClient};
use crate::clean::clean_html;
use crate::config::{ExtractConfig, PipelineConfig};
use crate::error::{Recovery, Result};
use crate::fingerprint::{content_hash, FingerprintStore};
use crate::history::{
    load_collection, merge_into_history, partition_by_mode, save_collection, Collection,
    FAVORITES_KEY,
};
use crate::ingest::{ensure_metrics_described, DynFetcher, HttpFetcher};
use crate::model::{ScoredArticle, Source, SourceMode};
use crate::personalization::interests_from_favorites;
use crate::ranking::{rank, score_item};
use crate::regrade::regrade_collection;
use crate::storage::{build_store, DynBlobStore};
use crate::venue::VenueAuthority;

/// Counters of one run. `Display` renders the one-line summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub fetched: usize,
    pub unchanged: usize,
    pub fetch_errors: usize,
    pub new_items: usize,
    pub news: usize,
    pub papers: usize,
    pub history_added: usize,
    /// Categories whose history could not be read or written this run.
    pub persist_errors: usize,
    pub state_saved: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.new_items > 0 {
            write!(f, "Found {} new articles.", self.new_items)
        } else {
            write!(f, "No new articles found.")
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Source>,
    fetcher: DynFetcher,
    llm: DynLlmClient,
    store: DynBlobStore,
    venues: Arc<VenueAuthority>,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: DynFetcher,
        llm: DynLlmClient,
        store: DynBlobStore,
        venues: Arc<VenueAuthority>,
    ) -> Self {
        Self {
            sources: config.sources(),
            config,
            fetcher,
            llm,
            store,
            venues,
            run_lock: Mutex::new(()),
        }
    }

    /// Production wiring: HTTP fetcher, configured LLM provider and storage backend.
    pub fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let venues = Arc::new(match &config.venue_table {
            Some(path) => VenueAuthority::load_from_file(path),
            None => VenueAuthority::default_seed(),
        });
        let fetcher = Arc::new(HttpFetcher::new(
            &config.fetch,
            &config.credentials,
            config.arxiv.clone(),
            venues.clone(),
        )?);
        let llm = build_client(&config.llm)?;
        let store = build_store(&config.storage)?;
        tracing::info!(
            sources = config.sources.len(),
            llm = llm.provider_name(),
            storage = store.name(),
            "pipeline ready"
        );
        Ok(Self::new(config, fetcher, llm, store, venues))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn store(&self) -> &DynBlobStore {
        &self.store
    }

    pub fn venues(&self) -> &VenueAuthority {
        &self.venues
    }

    /// Static interests plus keywords learned from favorites (deduplicated, static first).
    async fn extract_config(&self) -> ExtractConfig {
        let mut cfg = self.config.extract.clone();
        match interests_from_favorites(self.store.as_ref(), self.config.personalization.top_n).await {
            Ok(learned) => {
                for kw in learned {
                    if !cfg.interests.iter().any(|i| i.eq_ignore_ascii_case(&kw)) {
                        cfg.interests.push(kw);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "favorites unavailable; using configured interests only"),
        }
        cfg
    }

    async fn load_state(&self) -> Result<FingerprintStore> {
        let key = &self.config.storage.state_key;
        match FingerprintStore::load(self.store.as_ref(), key).await {
            Ok(fp) => Ok(fp),
            // The stored document is unusable: stop reading it and start over.
            Err(e) if e.recovery() == Recovery::StopProcessing => {
                tracing::warn!(error = %e, key = %key, "state unreadable; starting from an empty state");
                Ok(FingerprintStore::new())
            }
            // Storage unreachable: skip this run, the next one retries.
            Err(e) => Err(e),
        }
    }

    /// One full pass over all sources.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let _guard = self.run_lock.lock().await;
        ensure_metrics_described();
        let t0 = Instant::now();

        let mut fp = self.load_state().await?;
        let extract_cfg = self.extract_config().await;
        let mut summary = RunSummary {
            sources: self.sources.len(),
            ..RunSummary::default()
        };

        let mut pool: Vec<ScoredArticle> = Vec::new();
        let mut pool_links: HashSet<String> = HashSet::new();
        // (mode, url, hash) of sources that contributed items; committed after persisting
        let mut pending_hashes: Vec<(SourceMode, String, String)> = Vec::new();

        for source in &self.sources {
            let raw = match self.fetcher.fetch(source).await {
                Ok(raw) if !raw.is_empty() => raw,
                Ok(_) => {
                    summary.fetch_errors += 1;
                    counter!("radar_fetch_errors_total").increment(1);
                    tracing::warn!(url = %source.url, "empty content; retry next run");
                    continue;
                }
                Err(e) if e.recovery() == Recovery::SkipAndRetry => {
                    summary.fetch_errors += 1;
                    counter!("radar_fetch_errors_total").increment(1);
                    tracing::warn!(url = %source.url, error = %e, "fetch failed; retry next run");
                    continue;
                }
                Err(e) => return Err(e),
            };
            summary.fetched += 1;
            counter!("radar_sources_fetched_total").increment(1);

            let cleaned = clean_html(&raw.markup, &source.url);
            if cleaned.is_empty() {
                tracing::warn!(url = %source.url, "no text after cleaning; retry next run");
                continue;
            }
            let hash = content_hash(&cleaned);
            if !fp.is_changed(&source.url, &hash) {
                summary.unchanged += 1;
                counter!("radar_sources_unchanged_total").increment(1);
                tracing::info!(url = %source.url, hash = &hash[..8], "content unchanged; skipped");
                continue;
            }

            let outcome = extract_source(
                source,
                &raw,
                &cleaned,
                self.llm.as_ref(),
                &extract_cfg,
                &self.venues,
            )
            .await;
            if outcome.all_calls_failed() {
                tracing::warn!(url = %source.url, "model unreachable; fingerprint kept for retry");
                continue;
            }
            let found = outcome.items.len();
            let mut fresh = 0usize;
            for item in outcome.items {
                if !fp.is_new(&item.link) || !pool_links.insert(item.link.clone()) {
                    continue;
                }
                pool.push(score_item(item, None, &self.venues, &self.config.weights));
                fresh += 1;
            }
            // Content changed: remember it even when nothing usable came back.
            if fresh == 0 {
                fp.set(&source.url, hash);
            } else {
                pending_hashes.push((source.mode, source.url.clone(), hash));
            }
            tracing::info!(url = %source.url, mode = source.mode.as_str(), found, count = fresh, "source processed");
        }

        let ranked = rank(pool);
        summary.new_items = ranked.len();
        counter!("radar_new_items_total").increment(ranked.len() as u64);

        let (news, papers) = partition_by_mode(&ranked);
        summary.news = news.len();
        summary.papers = papers.len();
        let mut failed: Vec<SourceMode> = Vec::new();
        if !ranked.is_empty() {
            for (mode, block) in [(SourceMode::News, news), (SourceMode::Paper, papers)] {
                match self.persist_block(mode, &block).await {
                    Ok(added) => summary.history_added += added,
                    Err(e) => {
                        summary.persist_errors += 1;
                        counter!("radar_persist_errors_total").increment(1);
                        tracing::error!(mode = mode.as_str(), error = %e, "history not persisted; items stay unseen for the next run");
                        failed.push(mode);
                    }
                }
            }
        }

        for (mode, url, hash) in pending_hashes {
            if !failed.contains(&mode) {
                fp.set(&url, hash);
            }
        }
        for article in ranked.iter().filter(|a| !failed.contains(&a.item.kind)) {
            fp.mark_seen(article.link());
        }
        match fp.save(self.store.as_ref(), &self.config.storage.state_key).await {
            Ok(()) => summary.state_saved = true,
            Err(e) => tracing::error!(error = %e, "saving state failed; this run's dedup progress is lost"),
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("radar_run_ms").record(ms);
        gauge!("radar_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            new = summary.new_items,
            fetched = summary.fetched,
            unchanged = summary.unchanged,
            errors = summary.fetch_errors,
            ms = ms as u64,
            "{summary}"
        );
        Ok(summary)
    }

    /// Write `latest_<mode>` (possibly empty) and merge into `history_<mode>`.
    /// Returns history additions; an unreadable history is left as is and reported.
    async fn persist_block(&self, mode: SourceMode, block: &[ScoredArticle]) -> Result<usize> {
        let store = self.store.as_ref();
        let latest = Collection::Latest(mode).key();
        if let Err(e) = save_collection(store, &latest, block).await {
            tracing::error!(key = %latest, error = %e, "writing latest view failed");
        }
        if block.is_empty() {
            return Ok(0);
        }

        let key = Collection::History(mode).key();
        let mut history = load_collection(store, &key).await?;
        let added = merge_into_history(&mut history, block);
        if added > 0 {
            save_collection(store, &key, &history).await?;
        }
        tracing::info!(key = %key, added, total = history.len(), "history merged");
        Ok(added)
    }

    /// Regrade the favorites collection with interests learned from it.
    pub async fn regrade_favorites(&self) -> Result<usize> {
        let _guard = self.run_lock.lock().await;
        let store = self.store.as_ref();
        let interests =
            interests_from_favorites(store, self.config.personalization.top_n).await?;
        regrade_collection(
            store,
            FAVORITES_KEY,
            &interests,
            self.llm.as_ref(),
            &self.venues,
            &self.config.weights,
        )
        .await
    }
}
