//! Key/value backends for conversation history.
//!
//! Both backends store opaque bytes with a per-entry expiry and treat an
//! expired entry exactly like a missing one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache as MokaCache;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

use super::HistoryError;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[async_trait]
pub trait HistoryBackend: Send + Sync {
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    async fn delete(&self, key: &str) -> Result<()>;

    fn backend_type(&self) -> &'static str;
}

struct MemoryEntry {
    data: Bytes,
    expires_at: Instant,
}

/// Process-local backend on a moka cache
pub struct MemoryBackend {
    cache: MokaCache<String, Arc<MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: MokaCache::new(max_entries),
        }
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let entry = Arc::new(MemoryEntry {
            data: value,
            expires_at: Instant::now() + ttl,
        });
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            self.cache.invalidate(key).await;
            return Ok(None);
        }
        Ok(Some(entry.data.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Expiry sidecar written next to every stored value
#[derive(Serialize, Deserialize)]
struct EntryMeta {
    expires_at: u64,
    created_at: u64,
}

/// Backend storing one file per key under `base_path`.
///
/// File names are the xxh3-128 hash of the key, sharded by the first two hex
/// digits. Values and sidecars are written to a temp file and renamed into
/// place, so readers never observe a partial write.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn data_path(&self, key: &str) -> PathBuf {
        let hash = format!("{:032x}", xxh3_128(key.as_bytes()));
        self.base_path.join(&hash[0..2]).join(format!("{hash}.json"))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.data_path(key).with_extension("meta")
    }

    async fn write_atomic(path: &PathBuf, contents: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.data_path(key)).await;
        let _ = fs::remove_file(self.meta_path(key)).await;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl HistoryBackend for FilesystemBackend {
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let data_path = self.data_path(key);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Self::write_atomic(&data_path, &value).await?;

        let now = unix_now();
        let meta = EntryMeta {
            expires_at: now + ttl.as_secs(),
            created_at: now,
        };
        Self::write_atomic(&self.meta_path(key), &serde_json::to_vec(&meta)?).await?;

        debug!("Stored {} bytes for {} on disk", value.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let meta = match fs::read(self.meta_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta)?;

        if unix_now() >= meta.expires_at {
            self.remove(key).await;
            return Ok(None);
        }

        match fs::read(self.data_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let _ = fs::remove_file(self.meta_path(key)).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(key).await;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_backend_roundtrip_and_expiry() {
        let backend = MemoryBackend::new(100);
        backend
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));

        backend
            .set("short", Bytes::from_static(b"v"), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.get("short").await.unwrap(), None);

        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_filesystem_backend_roundtrip() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path().to_path_buf())
            .await
            .unwrap();

        backend
            .set("session:a:messages", Bytes::from_static(b"[]"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            backend.get("session:a:messages").await.unwrap(),
            Some(Bytes::from_static(b"[]"))
        );
        assert_eq!(backend.get("session:b:messages").await.unwrap(), None);

        let path = backend.data_path("session:a:messages");
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        backend.delete("session:a:messages").await.unwrap();
        assert_eq!(backend.get("session:a:messages").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_filesystem_backend_zero_ttl_expires() {
        let dir = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(dir.path().to_path_buf())
            .await
            .unwrap();

        backend
            .set("k", Bytes::from_static(b"[]"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.data_path("k").exists());
    }
}
