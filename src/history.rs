//! Output collections (latest / history / favorites) and the idempotent history merge.
//!
//! Every collection is a pretty-printed JSON array of `ScoredArticle` stored under a
//! flat key in the `BlobStore`.

use anyhow::Context;
use std::collections::HashSet;

use crate::error::{PipelineError, Result};
use crate::model::{ScoredArticle, SourceMode};
use crate::storage::BlobStore;

pub const FAVORITES_KEY: &str = "favorites.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Latest(SourceMode),
    History(SourceMode),
    Favorites,
}

impl Collection {
    pub fn key(self) -> String {
        match self {
            Collection::Latest(m) => format!("latest_{}.json", m.collection_suffix()),
            Collection::History(m) => format!("history_{}.json", m.collection_suffix()),
            Collection::Favorites => FAVORITES_KEY.to_string(),
        }
    }
}

/// Missing key → empty collection. An unparsable document is an error so the caller
/// never overwrites it with a fresh array.
pub async fn load_collection(store: &dyn BlobStore, key: &str) -> Result<Vec<ScoredArticle>> {
    let Some(bytes) = store.get(key).await.map_err(PipelineError::Storage)? else {
        return Ok(Vec::new());
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing collection {key}"))
        .map_err(PipelineError::Storage)
}

pub async fn save_collection(
    store: &dyn BlobStore,
    key: &str,
    articles: &[ScoredArticle],
) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(articles)
        .context("serializing collection")
        .map_err(PipelineError::Storage)?;
    bytes.push(b'\n');
    store.put(key, bytes).await.map_err(PipelineError::Storage)
}

/// Put the not-yet-present part of `ranked_pool` on top of `history`, keeping the pool's
/// order. Links already in history (or repeated in the pool) are skipped.
/// Returns how many articles were added; re-running with the same pool adds nothing.
pub fn merge_into_history(history: &mut Vec<ScoredArticle>, ranked_pool: &[ScoredArticle]) -> usize {
    let mut present: HashSet<&str> = history.iter().map(|a| a.link()).collect();
    let block: Vec<ScoredArticle> = ranked_pool
        .iter()
        .filter(|a| present.insert(a.link()))
        .cloned()
        .collect();
    let added = block.len();
    if added > 0 {
        history.splice(0..0, block);
    }
    added
}

/// Split a ranked pool by category, preserving order.
pub fn partition_by_mode(pool: &[ScoredArticle]) -> (Vec<ScoredArticle>, Vec<ScoredArticle>) {
    pool.iter()
        .cloned()
        .partition(|a| a.item.kind == SourceMode::News)
}

/// Insert at the front of favorites unless the link is already there.
pub async fn add_favorite(store: &dyn BlobStore, article: ScoredArticle) -> Result<bool> {
    let mut favorites = load_collection(store, FAVORITES_KEY).await?;
    if favorites.iter().any(|f| f.link() == article.link()) {
        tracing::info!(link = article.link(), "already in favorites");
        return Ok(false);
    }
    tracing::info!(link = article.link(), title = %article.item.title, "saved to favorites");
    favorites.insert(0, article);
    save_collection(store, FAVORITES_KEY, &favorites).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractedItem;
    use crate::storage::MemoryBlobStore;

    fn art(link: &str, score: i64) -> ScoredArticle {
        ScoredArticle {
            item: ExtractedItem::new(format!("T {link}"), link, SourceMode::News),
            score,
            personal_score: None,
        }
    }

    fn links(v: &[ScoredArticle]) -> Vec<&str> {
        v.iter().map(|a| a.link()).collect()
    }

    #[test]
    fn keys() {
        assert_eq!(Collection::Latest(SourceMode::News).key(), "latest_news.json");
        assert_eq!(Collection::History(SourceMode::Paper).key(), "history_papers.json");
        assert_eq!(Collection::Favorites.key(), "favorites.json");
    }

    #[test]
    fn pool_block_goes_on_top_in_order() {
        let mut history = vec![art("old1", 1), art("old2", 2)];
        let pool = vec![art("n1", 90), art("old2", 80), art("n2", 70), art("n1", 60)];
        let added = merge_into_history(&mut history, &pool);
        assert_eq!(added, 2);
        assert_eq!(links(&history), vec!["n1", "n2", "old1", "old2"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut history = vec![art("a", 1)];
        let pool = vec![art("b", 5), art("c", 3)];
        merge_into_history(&mut history, &pool);
        let snapshot = history.clone();
        assert_eq!(merge_into_history(&mut history, &pool), 0);
        assert_eq!(history, snapshot);
    }

    #[tokio::test]
    async fn favorites_dedupe_and_prepend() {
        let store = MemoryBlobStore::new();
        assert!(add_favorite(&store, art("a", 1)).await.unwrap());
        assert!(add_favorite(&store, art("b", 2)).await.unwrap());
        assert!(!add_favorite(&store, art("a", 9)).await.unwrap());
        let favs = load_collection(&store, FAVORITES_KEY).await.unwrap();
        assert_eq!(links(&favs), vec!["b", "a"]);
        assert_eq!(favs[1].score, 1);
    }

    #[tokio::test]
    async fn corrupt_collection_is_an_error() {
        let store = MemoryBlobStore::new();
        store.put("history_news.json", b"[{".to_vec()).await.unwrap();
        assert!(load_collection(&store, "history_news.json").await.is_err());
        assert!(load_collection(&store, "missing.json").await.unwrap().is_empty());
    }
}
