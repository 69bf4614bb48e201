// src/fingerprint.rs
//! Fingerprint store: last-seen content hash per source URL plus the monotone set of
//! links already emitted. Loaded and saved as one JSON document.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PipelineError, Result};
use crate::storage::BlobStore;

/// Persisted shape: `{ "seen_links": [...], "page_hashes": { url: hash } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlob {
    #[serde(default)]
    pub seen_links: BTreeSet<String>,
    #[serde(default)]
    pub page_hashes: BTreeMap<String, String>,
}

/// Lower-hex SHA-256 of the cleaned text.
pub fn content_hash(cleaned: &str) -> String {
    let digest = Sha256::digest(cleaned.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintStore {
    state: StateBlob,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StateBlob) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &StateBlob {
        &self.state
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.state.page_hashes.get(url).map(String::as_str)
    }

    pub fn set(&mut self, url: &str, hash: String) {
        self.state.page_hashes.insert(url.to_string(), hash);
    }

    /// `true` when `hash` differs from the stored one (or none is stored).
    pub fn is_changed(&self, url: &str, hash: &str) -> bool {
        self.get(url) != Some(hash)
    }

    pub fn is_new(&self, link: &str) -> bool {
        !self.state.seen_links.contains(link)
    }

    pub fn mark_seen(&mut self, link: &str) {
        if !self.state.seen_links.contains(link) {
            self.state.seen_links.insert(link.to_string());
        }
    }

    pub fn seen_count(&self) -> usize {
        self.state.seen_links.len()
    }

    /// Load the whole state. A missing blob is an empty state.
    pub async fn load(store: &dyn BlobStore, key: &str) -> Result<Self> {
        let bytes = store.get(key).await.map_err(PipelineError::Storage)?;
        let Some(bytes) = bytes else {
            return Ok(Self::new());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let state: StateBlob = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::StateCorrupt(format!("{key}: {e}")))?;
        Ok(Self { state })
    }

    /// Write the whole state back.
    pub async fn save(&self, store: &dyn BlobStore, key: &str) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.state)
            .map_err(|e| PipelineError::Storage(anyhow::Error::new(e)))?;
        store
            .put(key, bytes)
            .await
            .map_err(PipelineError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash("hello");
        assert_eq!(
            h,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(h, content_hash("hello"));
        assert_ne!(h, content_hash("hello "));
    }

    #[test]
    fn change_gate_and_seen_links() {
        let mut fp = FingerprintStore::new();
        assert!(fp.is_changed("u", "h1"));
        fp.set("u", "h1".into());
        assert!(!fp.is_changed("u", "h1"));
        assert!(fp.is_changed("u", "h2"));

        assert!(fp.is_new("l"));
        fp.mark_seen("l");
        fp.mark_seen("l");
        assert!(!fp.is_new("l"));
        assert_eq!(fp.seen_count(), 1);
    }

    #[tokio::test]
    async fn load_save_roundtrip() {
        let store = MemoryBlobStore::new();
        let empty = FingerprintStore::load(&store, "state.json").await.unwrap();
        assert_eq!(empty, FingerprintStore::new());

        let mut fp = FingerprintStore::new();
        fp.set("https://a", content_hash("x"));
        fp.mark_seen("https://a/1");
        fp.save(&store, "state.json").await.unwrap();

        let back = FingerprintStore::load(&store, "state.json").await.unwrap();
        assert_eq!(back, fp);
    }

    #[tokio::test]
    async fn corrupt_state_is_reported() {
        let store = MemoryBlobStore::new();
        store.put("state.json", b"{not json".to_vec()).await.unwrap();
        let err = FingerprintStore::load(&store, "state.json").await.unwrap_err();
        assert!(matches!(err, PipelineError::StateCorrupt(_)));
    }

    #[test]
    fn accepts_legacy_partial_documents() {
        let s: StateBlob = serde_json::from_str(r#"{"seen_links": ["a"]}"#).unwrap();
        assert!(s.page_hashes.is_empty());
        assert!(s.seen_links.contains("a"));
    }
}
