// src/storage.rs
//! Key/value blob storage for the state document and the output collections.
//!
//! - `LocalBlobStore`: one file per key under a root directory (tmp + rename writes).
//! - `S3BlobStore`: S3-compatible bucket (AWS, R2, MinIO) via `aws-sdk-s3`.
//! - `MemoryBlobStore`: in-process map for tests and dry runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, Config};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{StorageBackend, StorageConfig};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynBlobStore = Arc<dyn BlobStore>;

/// Build the configured backend.
pub fn build_store(cfg: &StorageConfig) -> Result<DynBlobStore> {
    match cfg.backend {
        StorageBackend::Local => Ok(Arc::new(LocalBlobStore::new(&cfg.root))),
        StorageBackend::S3 => {
            let bucket = cfg
                .bucket
                .clone()
                .filter(|b| !b.trim().is_empty())
                .context("storage.backend = s3 requires a bucket (storage.bucket or NEWS_BUCKET_NAME)")?;
            Ok(Arc::new(S3BlobStore::from_env(
                bucket,
                cfg.endpoint.as_deref(),
                &cfg.region,
            )?))
        }
    }
}

// ------------------------------------------------------------
// Local directory
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Keys are flat names; directory components are stripped and keys without a file
    /// name (`""`, `".."`, `"/"`) are rejected.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let name = Path::new(key)
            .file_name()
            .with_context(|| format!("invalid blob key {key:?}"))?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

// ------------------------------------------------------------
// S3-compatible bucket
// ------------------------------------------------------------

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Credentials come from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env(bucket: String, endpoint: Option<&str>, region: &str) -> Result<Self> {
        let access_key =
            std::env::var("AWS_ACCESS_KEY_ID").context("Missing AWS_ACCESS_KEY_ID env var")?;
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("Missing AWS_SECRET_ACCESS_KEY env var")?;

        let creds = Credentials::new(access_key, secret_key, None, None, "custom");
        let mut builder = Config::builder()
            .region(Region::new(region.to_string()))
            .credentials_provider(creds)
            .behavior_version(BehaviorVersion::latest());
        if let Some(ep) = endpoint.filter(|e| !e.trim().is_empty()) {
            builder = builder.endpoint_url(ep).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let out = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("s3 get {}/{}", self.bucket, key));
            }
        };
        let data = out
            .body
            .collect()
            .await
            .with_context(|| format!("s3 read body {}/{}", self.bucket, key))?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .with_context(|| format!("s3 put {}/{}", self.bucket, key))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

// ------------------------------------------------------------
// In-memory
// ------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.inner.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("nested"));
        assert!(store.get("news_state.json").await.unwrap().is_none());
        store.put("news_state.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("news_state.json").await.unwrap().unwrap(), b"{}");
        assert!(!dir.path().join("nested/news_state.json.tmp").exists());
    }

    #[tokio::test]
    async fn local_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.put("../evil.json", b"[]".to_vec()).await.unwrap();
        assert!(dir.path().join("evil.json").exists());

        for key in ["..", "", "/"] {
            assert!(store.put(key, b"[]".to_vec()).await.is_err(), "{key:?}");
            assert!(store.get(key).await.is_err(), "{key:?}");
        }
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryBlobStore::new();
        store.put("a", b"1".to_vec()).await.unwrap();
        store.put("a", b"2".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap(), b"2");
        assert_eq!(store.keys().await, vec!["a".to_string()]);
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let cfg = StorageConfig {
            backend: StorageBackend::S3,
            bucket: None,
            ..StorageConfig::default()
        };
        assert!(build_store(&cfg).is_err());
    }
}
