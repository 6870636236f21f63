use std::path::{Path, PathBuf};

use tokio::sync::OwnedMutexGuard;

use super::error::{IngestError, IngestResult};
use super::repository_manager::git::GitRunner;
use super::snapshot::SearchResult;

pub mod content;
mod diff;
pub mod scan;
pub mod search;
pub mod tree;

pub use diff::no_differences_message;
pub use scan::ScanOutput;

/// A working copy on local storage
///
/// Obtained from [`WorkingCopyManager::materialize`](super::WorkingCopyManager::materialize).
/// It owns the working copy's lock until dropped, so the checkout it was
/// materialized at cannot change under any read below. Materializing the same
/// repository again while a handle is alive waits for that handle to be dropped.
#[derive(Debug)]
pub struct LocalRepository {
    repository_location: PathBuf,
    git: GitRunner,
    _checkout: OwnedMutexGuard<()>,
}

impl LocalRepository {
    pub(crate) fn locked(
        repository_location: PathBuf,
        checkout: OwnedMutexGuard<()>,
        git: GitRunner,
    ) -> Self {
        Self {
            repository_location,
            git,
            _checkout: checkout,
        }
    }

    pub fn get_repository_dir(&self) -> &Path {
        &self.repository_location
    }

    /// Builds tree, file count and concatenated content from the current checkout
    pub async fn scan(&self, max_file_size: u64) -> IngestResult<ScanOutput> {
        let root = self.repository_location.clone();
        tokio::task::spawn_blocking(move || scan::scan_directory(&root, max_file_size))
            .await
            .map_err(|e| IngestError::Scan(format!("scan task failed: {}", e)))?
    }

    /// Searches the current checkout line by line, stopping after `max_results` matches
    pub async fn search_code(
        &self,
        pattern: &str,
        max_results: usize,
        max_file_size: u64,
    ) -> IngestResult<Vec<SearchResult>> {
        let root = self.repository_location.clone();
        let pattern = pattern.to_string();
        tokio::task::spawn_blocking(move || {
            search::search_directory(&root, &pattern, max_results, max_file_size)
        })
        .await
        .map_err(|e| IngestError::Search(format!("search task failed: {}", e)))?
    }

    /// Diff between two refs
    ///
    /// # Parameters
    ///
    /// * `fetch_url` - Remote to fetch both refs from first; `None` uses local refs only
    /// * `base` - Ref the diff starts from
    /// * `head` - Ref the diff goes to
    ///
    /// # Returns
    ///
    /// The unified diff text, or a "No differences found" message when the refs are identical.
    pub async fn diff(&self, fetch_url: Option<&str>, base: &str, head: &str) -> IngestResult<String> {
        diff::diff_refs(&self.git, &self.repository_location, fetch_url, base, head).await
    }
}
