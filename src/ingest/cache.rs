//! Time-bounded snapshot cache
//!
//! [`SnapshotCache`] sits in front of every clone or remote fetch. Entries are kept
//! by a [`SnapshotStore`] under the key produced by
//! [`Reference::cache_key`](super::Reference::cache_key), and an entry older than
//! the configured expiry is treated exactly like a missing one.
//!
//! The cache fails soft in both directions. A read that cannot be completed
//! (missing file, corrupt JSON, expired timestamp) is a miss, and a write that
//! cannot be completed is logged and dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::{IngestError, IngestResult};
use super::snapshot::{Snapshot, Summary};

/// Persisted form of a snapshot
///
/// `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub summary: Summary,
    pub tree: String,
    pub content: String,
    pub timestamp: i64,
}

impl From<&Snapshot> for CacheEntry {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            summary: snapshot.summary.clone(),
            tree: snapshot.tree.clone(),
            content: snapshot.content.clone(),
            timestamp: snapshot.captured_at.timestamp_millis(),
        }
    }
}

impl CacheEntry {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    fn into_snapshot(self) -> Option<Snapshot> {
        let captured_at = self.captured_at()?;
        Some(Snapshot {
            summary: self.summary,
            tree: self.tree,
            content: self.content,
            captured_at,
        })
    }
}

/// Key-value storage for cache entries
///
/// Implementations report failures as [`IngestError::Cache`]; [`SnapshotCache`]
/// decides that those failures are never fatal.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns `Ok(None)` when no entry exists for `key`
    async fn read(&self, key: &str) -> IngestResult<Option<CacheEntry>>;

    async fn write(&self, key: &str, entry: &CacheEntry) -> IngestResult<()>;
}

/// Stores each entry as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn read(&self, key: &str) -> IngestResult<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IngestError::Cache(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            IngestError::Cache(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    async fn write(&self, key: &str, entry: &CacheEntry) -> IngestResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            IngestError::Cache(format!(
                "failed to create cache directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let json = serde_json::to_vec(entry)
            .map_err(|e| IngestError::Cache(format!("failed to serialize entry: {}", e)))?;

        // Readers only ever see a complete file
        let path = self.entry_path(key);
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", key, std::process::id()));
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            IngestError::Cache(format!("failed to write {}: {}", tmp_path.display(), e))
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            IngestError::Cache(format!("failed to move entry to {}: {}", path.display(), e))
        })
    }
}

/// In-process store, used by tests and by callers that do not want disk persistence
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self, key: &str) -> IngestResult<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, entry: &CacheEntry) -> IngestResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn SnapshotStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the stored snapshot for `key` if it exists and has not expired
    pub async fn get(&self, key: &str) -> Option<Snapshot> {
        self.get_at(key, Utc::now()).await
    }

    /// Same as [`get`](Self::get) with an explicit notion of "now"
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Snapshot> {
        let entry = match self.store.read(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                tracing::warn!("Treating unreadable cache entry as a miss: {}", e);
                return None;
            }
        };

        let Some(snapshot) = entry.into_snapshot() else {
            tracing::warn!("Cache entry {} has an invalid timestamp, ignoring", key);
            return None;
        };

        if !self.is_fresh(snapshot.captured_at, now) {
            tracing::debug!(
                "Cache entry {} captured at {} has expired",
                key,
                snapshot.captured_at
            );
            return None;
        }

        tracing::info!("Cache hit for {}", key);
        Some(snapshot)
    }

    /// Stores `snapshot` under `key`; failures are logged, never returned
    pub async fn put(&self, key: &str, snapshot: &Snapshot) {
        let entry = CacheEntry::from(snapshot);
        match self.store.write(key, &entry).await {
            Ok(()) => tracing::debug!("Cached snapshot for {}", key),
            Err(e) => tracing::warn!("Failed to cache snapshot for {}: {}", key, e),
        }
    }

    fn is_fresh(&self, captured_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - captured_at).to_std() {
            Ok(age) => age < self.ttl,
            // captured in the future; small clock skew is tolerated up to the TTL
            Err(_) => match (captured_at - now).to_std() {
                Ok(ahead) => ahead < self.ttl,
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot(captured_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            summary: Summary::new("user/repo", Some(1), "# Hello"),
            tree: "└── README.md\n".to_string(),
            content: "# Hello".to_string(),
            captured_at,
        }
    }

    #[tokio::test]
    async fn test_ttl_boundaries() {
        let ttl = Duration::from_secs(60 * 60);
        let cache = SnapshotCache::new(Arc::new(MemorySnapshotStore::new()), ttl);
        let t = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        cache.put("key", &sample_snapshot(t)).await;

        let epsilon = chrono::Duration::seconds(1);
        let expiry = chrono::Duration::from_std(ttl).unwrap();

        let served = cache.get_at("key", t + expiry - epsilon).await;
        assert_eq!(served, Some(sample_snapshot(t)));

        assert!(cache.get_at("key", t + expiry + epsilon).await.is_none());
    }

    #[tokio::test]
    async fn test_future_timestamp_beyond_ttl_is_expired() {
        let ttl = Duration::from_secs(60 * 60);
        let cache = SnapshotCache::new(Arc::new(MemorySnapshotStore::new()), ttl);
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let skew = chrono::Duration::from_std(ttl).unwrap();

        cache.put("near", &sample_snapshot(now + chrono::Duration::seconds(5))).await;
        cache.put("far", &sample_snapshot(now + skew * 24)).await;

        assert!(cache.get_at("near", now).await.is_some());
        assert!(cache.get_at("far", now).await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(store.entry_path("broken"), b"{not json").unwrap();

        assert!(store.read("broken").await.is_err());

        let cache = SnapshotCache::new(Arc::new(store), Duration::from_secs(60));
        assert!(cache.get("broken").await.is_none());
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));
        let cache = SnapshotCache::new(Arc::new(store.clone()), Duration::from_secs(60));
        let snapshot = sample_snapshot(Utc::now());

        cache.put("https%3A%2F%2Fgithub.com%2Fuser%2Frepo", &snapshot).await;

        let raw = std::fs::read_to_string(
            store.entry_path("https%3A%2F%2Fgithub.com%2Fuser%2Frepo"),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for field in ["summary", "tree", "content", "timestamp"] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }

        let cached = cache
            .get("https%3A%2F%2Fgithub.com%2Fuser%2Frepo")
            .await
            .unwrap();
        assert_eq!(cached.content, snapshot.content);
        assert_eq!(
            cached.captured_at.timestamp_millis(),
            snapshot.captured_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let cache = SnapshotCache::new(
            Arc::new(FileSnapshotStore::new(&blocker)),
            Duration::from_secs(60),
        );
        cache.put("key", &sample_snapshot(Utc::now())).await;
        assert!(cache.get("key").await.is_none());
    }
}
