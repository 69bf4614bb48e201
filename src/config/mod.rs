// src/config/mod.rs
//! Injected pipeline configuration: sources, credentials, LLM endpoint, batch sizes,
//! cutoff windows, score weights and storage. Loaded from TOML; every field has a default.

pub mod llm;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::model::{DataEndpointRule, Source, SourceMode};
use crate::ranking::ScoreWeights;
pub use llm::LlmConfig;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
/// When set, the state blob and collections go to this bucket.
pub const ENV_BUCKET_NAME: &str = "NEWS_BUCKET_NAME";
/// Upper bounds applied by sanitizing; larger values are clamped.
pub const MAX_CUTOFF_DAYS: i64 = 365;
pub const MAX_INTERVAL_HOURS: u64 = 24 * 30;

const DEFAULT_SOURCES: &[&str] = &[
    "https://about.fb.com/news/",
    "https://ai.meta.com/blog/",
    "https://openai.com/research/index/",
    "https://blog.google/products/search/",
    "https://www.apple.com/newsroom/",
    "https://newsroom.tiktok.com/?lang=en",
    "https://www.aboutamazon.com/amazon-news-today",
    "https://machinelearning.apple.com/updates",
    "https://www.theverge.com/tech",
    "https://arxiv.org/list/cs.HC/recent",
    "https://arxiv.org/list/cs.MA/recent",
    "https://arxiv.org/list/cs.MM/recent",
    "https://blog.google/technology/google-deepmind/",
    "https://www.media.mit.edu/",
    "https://hci.stanford.edu/research/",
    "https://www.microsoft.com/en-us/research/blog/",
    "https://blogs.nvidia.com/",
];

/// A source is either a bare URL or a table with an explicit mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        mode: Option<SourceMode>,
    },
}

impl SourceEntry {
    fn parts(&self) -> (&str, Option<SourceMode>) {
        match self {
            SourceEntry::Url(u) => (u.as_str(), None),
            SourceEntry::Detailed { url, mode } => (url.as_str(), *mode),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub api_base: String,
    /// Entries requested per page.
    pub page_size: usize,
    /// Entries published before `now - cutoff_days` end pagination.
    pub cutoff_days: i64,
    /// Safety cap on entries collected per source.
    pub max_items: usize,
    /// Pause between page requests (the API is rate limited).
    pub page_delay_ms: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_base: "http://export.arxiv.org/api/query".into(),
            page_size: 50,
            cutoff_days: 2,
            max_items: 200,
            page_delay_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Entries per LLM request for paginated sources.
    pub batch_size: usize,
    /// Cleaned text is truncated to this many chars inside the prompt.
    pub max_prompt_chars: usize,
    /// Topics the semantic `ai_score` is measured against.
    pub interests: Vec<String>,
    /// Language the model writes `summary` in.
    pub summary_language: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            max_prompt_chars: 50_000,
            interests: ["AI", "Agent", "HCI", "XR/Spatial", "Generation"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            summary_language: "Chinese".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the local backend.
    pub root: PathBuf,
    pub bucket: Option<String>,
    /// Custom S3-compatible endpoint (R2, MinIO, ...).
    pub endpoint: Option<String>,
    pub region: String,
    pub state_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("data"),
            bucket: None,
            endpoint: None,
            region: "us-east-1".into(),
            state_key: "news_state.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_hours: u64,
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonalizationConfig {
    pub top_n: usize,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self { top_n: 15 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<SourceEntry>,
    /// domain substring → cookie header value
    pub credentials: BTreeMap<String, String>,
    pub data_endpoints: Vec<DataEndpointRule>,
    pub llm: LlmConfig,
    pub fetch: FetchConfig,
    pub arxiv: ArxivConfig,
    pub extract: ExtractConfig,
    pub weights: ScoreWeights,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub personalization: PersonalizationConfig,
    /// Optional JSON venue table; the built-in seed is used otherwise.
    pub venue_table: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES
                .iter()
                .map(|u| SourceEntry::Url(u.to_string()))
                .collect(),
            credentials: BTreeMap::new(),
            data_endpoints: vec![DataEndpointRule::tiktok_newsroom()],
            llm: LlmConfig::default(),
            fetch: FetchConfig::default(),
            arxiv: ArxivConfig::default(),
            extract: ExtractConfig::default(),
            weights: ScoreWeights::default(),
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            personalization: PersonalizationConfig::default(),
            venue_table: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit TOML path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let mut cfg: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    ///
    /// `NEWS_BUCKET_NAME` then forces the S3 backend.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("PIPELINE_CONFIG_PATH points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(bucket) = std::env::var(ENV_BUCKET_NAME) {
            if !bucket.trim().is_empty() {
                self.storage.backend = StorageBackend::S3;
                self.storage.bucket = Some(bucket.trim().to_string());
            }
        }
    }

    fn sanitize(&mut self) {
        let d = ArxivConfig::default();
        if self.arxiv.page_size == 0 {
            self.arxiv.page_size = d.page_size;
        }
        if self.arxiv.max_items == 0 {
            self.arxiv.max_items = d.max_items;
        }
        if self.arxiv.cutoff_days <= 0 {
            self.arxiv.cutoff_days = d.cutoff_days;
        }
        self.arxiv.cutoff_days = self.arxiv.cutoff_days.min(MAX_CUTOFF_DAYS);
        let e = ExtractConfig::default();
        if self.extract.batch_size == 0 {
            self.extract.batch_size = e.batch_size;
        }
        if self.extract.max_prompt_chars == 0 {
            self.extract.max_prompt_chars = e.max_prompt_chars;
        }
        self.extract.interests.retain(|i| !i.trim().is_empty());
        if self.extract.interests.is_empty() {
            self.extract.interests = e.interests;
        }
        if self.extract.summary_language.trim().is_empty() {
            self.extract.summary_language = e.summary_language;
        }
        if self.schedule.interval_hours == 0 {
            self.schedule.interval_hours = ScheduleConfig::default().interval_hours;
        }
        self.schedule.interval_hours = self.schedule.interval_hours.min(MAX_INTERVAL_HOURS);
        self.credentials.retain(|domain, cookie| {
            !domain.trim().is_empty() && !cookie.trim().is_empty()
        });
    }

    /// Reject settings the pipeline cannot start with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.storage.state_key.trim().is_empty() {
            return Err(PipelineError::Config("storage.state_key is empty".into()));
        }
        if self.storage.backend == StorageBackend::S3
            && self.storage.bucket.as_deref().is_none_or(|b| b.trim().is_empty())
        {
            return Err(PipelineError::Config(
                "storage.backend = s3 requires a bucket (storage.bucket or NEWS_BUCKET_NAME)".into(),
            ));
        }
        if self.llm.enabled {
            let ok = url::Url::parse(&self.llm.base_url)
                .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
            if !ok {
                return Err(PipelineError::Config(format!(
                    "llm.base_url is not an http(s) URL: {}",
                    self.llm.base_url
                )));
            }
        }
        Ok(())
    }

    /// Resolve configured entries into sources, dropping blanks and duplicate URLs.
    pub fn sources(&self) -> Vec<Source> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(self.sources.len());
        for entry in &self.sources {
            let (url, mode) = entry.parts();
            let url = url.trim();
            if url.is_empty() || !seen.insert(url.to_string()) {
                continue;
            }
            out.push(Source::new(url, mode, &self.data_endpoints));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    #[test]
    fn parses_mixed_source_entries() {
        let toml = r#"
sources = [
  "https://arxiv.org/list/cs.HC/recent",
  { url = "https://www.apple.com/newsroom/", mode = "paper" },
  "https://arxiv.org/list/cs.HC/recent",
  "  ",
]

[credentials]
"weibo.com" = "SUB=abc"
"empty.com" = ""

[arxiv]
page_size = 0
cutoff_days = 3
"#;
        let mut cfg: PipelineConfig = toml::from_str(toml).unwrap();
        cfg.sanitize();
        let sources = cfg.sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].mode, SourceMode::Paper);
        assert!(matches!(sources[0].kind, SourceKind::Arxiv { .. }));
        assert_eq!(sources[1].mode, SourceMode::Paper);
        assert_eq!(cfg.arxiv.page_size, 50);
        assert_eq!(cfg.arxiv.cutoff_days, 3);
        assert_eq!(cfg.credentials.len(), 1);
        // defaults survive partial files
        assert_eq!(cfg.extract.batch_size, 8);
        assert_eq!(cfg.weights.tech_release_boost, 200);
    }

    #[test]
    fn default_config_has_builtin_sources() {
        let cfg = PipelineConfig::default();
        let sources = cfg.sources();
        assert!(sources.iter().any(|s| s.kind.is_arxiv()));
        assert!(sources
            .iter()
            .any(|s| matches!(s.kind, SourceKind::DataEndpoint(_))));
    }

    #[test]
    fn absurd_windows_are_clamped() {
        let mut cfg: PipelineConfig = toml::from_str(
            r#"
[arxiv]
cutoff_days = 9223372036854775807
[schedule]
interval_hours = 9223372036854775807
"#,
        )
        .unwrap();
        cfg.sanitize();
        assert_eq!(cfg.arxiv.cutoff_days, MAX_CUTOFF_DAYS);
        assert_eq!(cfg.schedule.interval_hours, MAX_INTERVAL_HOURS);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        assert!(PipelineConfig::default().validate().is_ok());

        let mut s3 = PipelineConfig::default();
        s3.storage.backend = StorageBackend::S3;
        s3.storage.bucket = Some("  ".into());
        let err = s3.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.recovery(), crate::error::Recovery::StopProcessing);

        let mut llm = PipelineConfig::default();
        llm.llm.base_url = "api.deepseek.com".into();
        assert!(llm.validate().is_err());
        llm.llm.enabled = false;
        assert!(llm.validate().is_ok());
    }
}
