//! Core records shared by every stage: sources, extracted items, scored articles.

use serde::{Deserialize, Serialize};

/// Upper bound of the model's semantic relevance score.
pub const AI_SCORE_MAX: u8 = 100;
/// Upper bound of the impact scale (see `venue` for the authority side).
pub const IMPACT_SCORE_MAX: u8 = 50;
/// Upper bound of the personal affinity score.
pub const PERSONAL_SCORE_MAX: u8 = 100;

/// News vs. paper. Assigned once per source at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    News,
    Paper,
}

impl SourceMode {
    /// URL heuristic used when a source has no explicit mode.
    pub fn detect(url: &str) -> Self {
        if url.contains("openai.com/index") {
            return SourceMode::News;
        }
        const PAPER_HINTS: [&str; 5] = ["arxiv.org", ".edu", "publication", "research", "deepmind"];
        if PAPER_HINTS.iter().any(|h| url.contains(h)) {
            SourceMode::Paper
        } else {
            SourceMode::News
        }
    }

    /// Suffix of the per-category collection keys (`latest_news.json`, `history_papers.json`).
    pub fn collection_suffix(self) -> &'static str {
        match self {
            SourceMode::News => "news",
            SourceMode::Paper => "papers",
        }
    }

    pub fn from_collection_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "news" => Some(SourceMode::News),
            "papers" | "paper" => Some(SourceMode::Paper),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceMode::News => "news",
            SourceMode::Paper => "paper",
        }
    }
}

/// URL rewrite + JSON unwrap for destinations that serve their content from a data route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEndpointRule {
    /// Substring of the source URL that selects this rule.
    pub host_pattern: String,
    /// Query string appended to the URL (without `?`).
    pub data_query: String,
    /// Top-level key of the JSON payload holding the article.
    pub payload_key: String,
}

impl DataEndpointRule {
    pub fn tiktok_newsroom() -> Self {
        Self {
            host_pattern: "newsroom.tiktok.com".into(),
            data_query: "_data=routes%2F_app._index&lang=en".into(),
            payload_key: "mainArticle".into(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        !self.host_pattern.is_empty() && url.contains(&self.host_pattern)
    }
}

/// Protocol family of a source; decides how the fetcher talks to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    /// Paginated academic API (`arxiv.org/list/<category>/...`).
    Arxiv { category: String },
    DataEndpoint(DataEndpointRule),
}

impl SourceKind {
    pub fn detect(url: &str, rules: &[DataEndpointRule]) -> Self {
        if let Some(category) = arxiv_category(url) {
            return SourceKind::Arxiv { category };
        }
        if let Some(rule) = rules.iter().find(|r| r.matches(url)) {
            return SourceKind::DataEndpoint(rule.clone());
        }
        SourceKind::Web
    }

    pub fn is_arxiv(&self) -> bool {
        matches!(self, SourceKind::Arxiv { .. })
    }
}

fn arxiv_category(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("arxiv.org/list/")?;
    let cat = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if cat.is_empty() {
        None
    } else {
        Some(cat.to_string())
    }
}

/// One configured source, immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub mode: SourceMode,
    pub kind: SourceKind,
}

impl Source {
    pub fn new(url: &str, mode: Option<SourceMode>, rules: &[DataEndpointRule]) -> Self {
        let url = url.trim().to_string();
        Self {
            mode: mode.unwrap_or_else(|| SourceMode::detect(&url)),
            kind: SourceKind::detect(&url, rules),
            url,
        }
    }

    /// Host of the source URL, or the raw URL when it does not parse.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Raw fetch result. `entries` is only filled for paginated sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContent {
    pub markup: String,
    pub entries: Vec<String>,
}

impl RawContent {
    pub fn page(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markup.trim().is_empty() && self.entries.is_empty()
    }
}

/// One validated item produced by the extractor. `link` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub ai_score: u8,
    #[serde(default)]
    pub impact_score: u8,
    #[serde(default)]
    pub is_tech_release: bool,
    #[serde(default)]
    pub code_url: Option<String>,
    #[serde(default)]
    pub score_reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: SourceMode,
    #[serde(default)]
    pub source_domain: String,
}

impl ExtractedItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>, kind: SourceMode) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            date: String::new(),
            venue: String::new(),
            ai_score: 0,
            impact_score: 0,
            is_tech_release: false,
            code_url: None,
            score_reason: String::new(),
            tags: Vec::new(),
            kind,
            source_domain: String::new(),
        }
    }

    /// A code link counts only when it is a non-blank string.
    pub fn has_code_url(&self) -> bool {
        self.code_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Extracted item plus its composite score. Persisted in every collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub item: ExtractedItem,
    #[serde(default)]
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_score: Option<u8>,
}

impl ScoredArticle {
    pub fn link(&self) -> &str {
        &self.item.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_detection_by_url() {
        assert_eq!(SourceMode::detect("https://arxiv.org/list/cs.HC/recent"), SourceMode::Paper);
        assert_eq!(SourceMode::detect("https://hci.stanford.edu/research/"), SourceMode::Paper);
        assert_eq!(SourceMode::detect("https://www.theverge.com/tech"), SourceMode::News);
        // research path, but the OpenAI index is treated as news
        assert_eq!(SourceMode::detect("https://openai.com/index/research/"), SourceMode::News);
    }

    #[test]
    fn kind_detection() {
        let rules = vec![DataEndpointRule::tiktok_newsroom()];
        assert_eq!(
            SourceKind::detect("https://arxiv.org/list/cs.MA/recent", &rules),
            SourceKind::Arxiv { category: "cs.MA".into() }
        );
        assert!(matches!(
            SourceKind::detect("https://newsroom.tiktok.com/?lang=en", &rules),
            SourceKind::DataEndpoint(_)
        ));
        assert_eq!(SourceKind::detect("https://blogs.nvidia.com/", &rules), SourceKind::Web);
    }

    #[test]
    fn explicit_mode_wins() {
        let s = Source::new("https://www.apple.com/newsroom/", Some(SourceMode::Paper), &[]);
        assert_eq!(s.mode, SourceMode::Paper);
        assert_eq!(s.domain(), "www.apple.com");
    }

    #[test]
    fn scored_article_flattens_item() {
        let mut item = ExtractedItem::new("X", "http://a/1", SourceMode::Paper);
        item.tags = vec!["Agent".into()];
        let art = ScoredArticle { item, score: 330, personal_score: None };
        let v = serde_json::to_value(&art).unwrap();
        assert_eq!(v["type"], "paper");
        assert_eq!(v["score"], 330);
        assert!(v.get("personal_score").is_none());
        let back: ScoredArticle = serde_json::from_value(v).unwrap();
        assert_eq!(back, art);
    }
}
