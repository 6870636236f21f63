//! Request-level orchestration of cache, working copy and remote fallback
//!
//! Every read operation follows the same order:
//!
//! 1. [`fetch_snapshot`](RepositoryIngestor::fetch_snapshot) asks the
//!    [`SnapshotCache`] first and returns a fresh entry verbatim.
//! 2. On a miss it materializes a working copy and scans it, or, when that fails,
//!    asks the remote API. Whichever succeeds is cached.
//! 3. Extraction reads from the snapshot; search and diff use the working copy and
//!    fall back to the remote API.
//!
//! Cache-miss handling is serialized per cache key, so overlapping requests for
//! the same reference clone and scan once and the later ones are served from the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::cache::{FileSnapshotStore, SnapshotCache};
use super::error::IngestResult;
use super::extractor;
use super::reference::{Reference, validate_ref_name};
use super::remote::{GithubApiClient, MetadataSource, RemoteRepositoryApi};
use super::repository_manager::WorkingCopyManager;
use super::snapshot::{FileContent, SearchResult, Snapshot, Summary};
use super::strategy::FallbackChain;
use crate::config::IngestConfig;

pub struct RepositoryIngestor {
    cache: SnapshotCache,
    manager: Arc<WorkingCopyManager>,
    remote: Option<Arc<dyn RemoteRepositoryApi>>,
    metadata: Option<Arc<dyn MetadataSource>>,
    max_file_size: u64,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepositoryIngestor {
    /// Creates an ingestor with no remote fallback and no enrichment
    pub fn new(cache: SnapshotCache, manager: Arc<WorkingCopyManager>, max_file_size: u64) -> Self {
        Self {
            cache,
            manager,
            remote: None,
            metadata: None,
            max_file_size,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteRepositoryApi>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_metadata_source(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Wires the file cache, working copy manager and GitHub client from `config`
    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        let store = Arc::new(FileSnapshotStore::new(config.cache_dir.clone()));
        let cache = SnapshotCache::new(store, config.cache_ttl);
        let manager = Arc::new(WorkingCopyManager::from_config(config)?);
        let github = Arc::new(GithubApiClient::from_config(config)?);

        Ok(Self::new(cache, manager, config.max_file_size)
            .with_remote(github.clone())
            .with_metadata_source(github))
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn manager(&self) -> &WorkingCopyManager {
        &self.manager
    }

    fn inflight_map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        match self.inflight.lock() {
            Ok(inflight) => inflight,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn inflight_slot(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inflight_map()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forgets the slot of `key` unless another request still holds or awaits it
    fn release_slot(&self, key: &str, slot: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self.inflight_map();
        // one reference in the map and ours
        if Arc::strong_count(&slot) <= 2 {
            inflight.remove(key);
        }
    }

    /// Summary, tree and content of `reference`
    ///
    /// Served from the cache when a fresh entry exists. Otherwise built from a
    /// working copy, or from the remote API when no working copy can be produced,
    /// and cached either way.
    pub async fn fetch_snapshot(&self, reference: &Reference) -> IngestResult<Snapshot> {
        let key = reference.cache_key();
        if let Some(snapshot) = self.cache.get(&key).await {
            return Ok(snapshot);
        }

        let slot = self.inflight_slot(&key);
        let result = {
            let _flight = slot.lock().await;
            self.fill_cache(reference, &key).await
        };
        self.release_slot(&key, slot);
        result
    }

    async fn fill_cache(&self, reference: &Reference, key: &str) -> IngestResult<Snapshot> {
        // another request may have filled the cache while we waited
        if let Some(snapshot) = self.cache.get(key).await {
            return Ok(snapshot);
        }

        let mut chain = FallbackChain::new(format!("Snapshot of {}", reference))
            .then("working copy", self.snapshot_from_working_copy(reference));
        if let Some(remote) = &self.remote {
            chain = chain.then("remote API", remote.snapshot(reference));
        }

        let snapshot = chain.run().await?;
        self.cache.put(key, &snapshot).await;
        Ok(snapshot)
    }

    async fn snapshot_from_working_copy(&self, reference: &Reference) -> IngestResult<Snapshot> {
        let scanned = {
            let repository = self.manager.materialize(reference).await?;
            repository.scan(self.max_file_size).await?
        };
        tracing::info!(
            "Scanned {} files of {}",
            scanned.file_count,
            reference.display_name()
        );

        let mut summary = Summary::new(
            reference.display_name(),
            Some(scanned.file_count),
            &scanned.content,
        );
        if let (Some(metadata), Some(_)) = (&self.metadata, reference.github()) {
            match metadata.metadata(reference).await {
                Ok(found) => summary = summary.merge(&found),
                Err(e) => tracing::warn!("Skipping metadata enrichment for {}: {}", reference, e),
            }
        }

        Ok(Snapshot::new(summary, scanned.tree, scanned.content))
    }

    /// Requested files as objects, in request order
    ///
    /// Paths missing from the snapshot are asked from the remote API as a last
    /// resort; paths found nowhere are omitted.
    pub async fn get_files_as_objects(
        &self,
        reference: &Reference,
        paths: &[String],
    ) -> IngestResult<Vec<FileContent>> {
        let snapshot = self.fetch_snapshot(reference).await?;
        let mut files = extractor::extract_files(&snapshot.content, paths);

        let missing: Vec<String> = paths
            .iter()
            .filter(|requested| !files.iter().any(|f| extractor::resolves_to(requested, &f.path)))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(files);
        }

        let Some(remote) = &self.remote else {
            return Ok(files);
        };
        if reference.github().is_none() {
            return Ok(files);
        }

        tracing::debug!(
            "{} requested paths not in snapshot of {}, asking remote API",
            missing.len(),
            reference
        );
        match remote.file_contents(reference, &missing).await {
            Ok(fetched) => {
                for file in fetched {
                    if !files.iter().any(|f| f.path == file.path) {
                        files.push(file);
                    }
                }
                Ok(reorder(files, paths))
            }
            Err(e) => {
                tracing::warn!("Remote file lookup for {} failed: {}", reference, e);
                Ok(files)
            }
        }
    }

    /// Requested files as concatenated content, itself valid extractor input
    pub async fn get_files_content(
        &self,
        reference: &Reference,
        paths: &[String],
    ) -> IngestResult<String> {
        let files = self.get_files_as_objects(reference, paths).await?;
        Ok(extractor::format_files(&files))
    }

    /// Line search with context, at most `max_results` results
    pub async fn search(
        &self,
        reference: &Reference,
        query: &str,
        max_results: usize,
    ) -> IngestResult<Vec<SearchResult>> {
        let mut chain = FallbackChain::new(format!("Search in {}", reference))
            .then("working copy", self.search_working_copy(reference, query, max_results));
        if let Some(remote) = &self.remote {
            chain = chain.then("remote API", remote.search(reference, query, max_results));
        }
        chain.run().await
    }

    async fn search_working_copy(
        &self,
        reference: &Reference,
        query: &str,
        max_results: usize,
    ) -> IngestResult<Vec<SearchResult>> {
        let repository = self.manager.materialize(reference).await?;
        let mut results = repository
            .search_code(query, max_results, self.max_file_size)
            .await?;
        let display_name = reference.display_name();
        for result in &mut results {
            result.repository.get_or_insert_with(|| display_name.clone());
        }
        Ok(results)
    }

    /// Textual diff between `base` and `head`
    pub async fn diff(&self, reference: &Reference, base: &str, head: &str) -> IngestResult<String> {
        validate_ref_name(base)?;
        validate_ref_name(head)?;

        let mut chain = FallbackChain::new(format!("Diff {}...{} of {}", base, head, reference))
            .then("working copy", self.diff_working_copy(reference, base, head));
        if let Some(remote) = &self.remote {
            chain = chain.then("remote API", remote.diff(reference, base, head));
        }
        chain.run().await
    }

    async fn diff_working_copy(
        &self,
        reference: &Reference,
        base: &str,
        head: &str,
    ) -> IngestResult<String> {
        let at_base = reference.with_ref(Some(base.to_string()));
        let repository = self.manager.materialize(&at_base).await?;
        let fetch_url = self.manager.fetch_url(reference);
        repository.diff(Some(&fetch_url), base, head).await
    }
}

/// Orders `files` by the position of the first requested path resolving to each
fn reorder(mut files: Vec<FileContent>, requested: &[String]) -> Vec<FileContent> {
    files.sort_by_key(|file| {
        requested
            .iter()
            .position(|r| extractor::resolves_to(r, &file.path))
            .unwrap_or(usize::MAX)
    });
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::MemorySnapshotStore;

    fn file(path: &str) -> FileContent {
        FileContent {
            path: path.to_string(),
            content: String::new(),
        }
    }

    #[tokio::test]
    async fn test_inflight_slots_are_released() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkingCopyManager::new(
            None,
            root.path().to_path_buf(),
            std::time::Duration::from_secs(10),
        )
        .unwrap();
        let cache = SnapshotCache::new(
            Arc::new(MemorySnapshotStore::new()),
            std::time::Duration::from_secs(60),
        );
        let ingestor = RepositoryIngestor::new(cache, Arc::new(manager), 1024);

        let reference = Reference::parse("/nonexistent/repodigest/slots", None).unwrap();
        assert!(ingestor.fetch_snapshot(&reference).await.is_err());
        assert!(ingestor.inflight_map().is_empty());
    }

    #[test]
    fn test_reorder_follows_request_order() {
        let requested = vec!["LICENSE".to_string(), "a.ts".to_string()];
        let ordered = reorder(vec![file("src/a.ts"), file("LICENSE")], &requested);
        let names: Vec<&str> = ordered.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["LICENSE", "src/a.ts"]);
    }
}
