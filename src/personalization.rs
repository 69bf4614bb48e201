//! Interest keywords derived from the favorites collection by plain frequency counting.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::history::{load_collection, FAVORITES_KEY};
use crate::model::ScoredArticle;
use crate::storage::BlobStore;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "for", "to", "of", "and", "or", "with", "by", "is",
    "are", "was", "were", "this", "that", "it", "model", "using", "based", "new", "paper",
    "news", "study", "research", "proposed", "method", "results", "show", "from", "as", "be",
    "can", "we", "our", "which", "has", "have", "not", "but", "learning", "models", "data",
    "training", "approach", "system", "performance", "stateoftheart", "introduction", "work",
    "via", "large", "language",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceCell<HashSet<&'static str>> = OnceCell::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

fn re_punct() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

/// Top `top_n` keywords over titles and summaries. Ties keep first-occurrence order.
pub fn extract_interests(articles: &[ScoredArticle], top_n: usize) -> Vec<String> {
    let mut text = String::new();
    for a in articles {
        text.push(' ');
        text.push_str(&a.item.title);
        text.push(' ');
        text.push_str(&a.item.summary);
    }
    let text = re_punct().replace_all(&text, "").to_lowercase();

    // word -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, w) in text
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !stop_words().contains(w))
        .enumerate()
    {
        counts.entry(w).or_insert((0, pos)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(w, (c, p))| (w, c, p)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(w, _, _)| w.to_string())
        .collect()
}

/// Interests from the stored favorites; a missing collection yields none.
pub async fn interests_from_favorites(store: &dyn BlobStore, top_n: usize) -> Result<Vec<String>> {
    let favorites = load_collection(store, FAVORITES_KEY).await?;
    Ok(extract_interests(&favorites, top_n))
}
