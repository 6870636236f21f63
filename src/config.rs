//! Runtime configuration for the ingestion pipeline
//!
//! Values are resolved in this order (highest priority first):
//!
//! 1. Command line arguments (applied by the binaries on top of [`IngestConfig::from_env`])
//! 2. Environment variables
//! 3. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `REPODIGEST_GITHUB_TOKEN` (falls back to `GITHUB_TOKEN`): token used for the
//!   GitHub API and for cloning private repositories
//! - `REPODIGEST_CACHE_DIR`: directory holding cached snapshots
//! - `REPODIGEST_CACHE_TTL_MINUTES`: snapshot expiry in minutes
//! - `REPODIGEST_WORKDIR`: root directory for working copies
//!
//! ```bash
//! export REPODIGEST_GITHUB_TOKEN=your_github_token
//! export REPODIGEST_CACHE_TTL_MINUTES=30
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Default GitHub REST API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Files larger than this are replaced by a placeholder in snapshots and skipped by search
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Name of the cache directory created under the current working directory
pub const DEFAULT_CACHE_DIR_NAME: &str = ".repodigest-cache";

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Optional GitHub token for API access and authenticated clones
    pub github_token: Option<String>,

    /// Directory for on-disk snapshot cache files
    pub cache_dir: PathBuf,

    /// Snapshots older than this are never served
    pub cache_ttl: Duration,

    /// Parent directory of all working copies
    pub working_copy_root: PathBuf,

    /// Upper bound for a single git subprocess (clone, fetch, checkout, diff)
    pub git_timeout: Duration,

    /// Upper bound for a single remote API request
    pub http_timeout: Duration,

    /// Size ceiling in bytes for files included in content and search
    pub max_file_size: u64,

    /// Base URL of the remote query API
    pub api_base_url: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let cache_dir = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CACHE_DIR_NAME);

        Self {
            github_token: None,
            cache_dir,
            cache_ttl: Duration::from_secs(60 * 60),
            working_copy_root: std::env::temp_dir(),
            git_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl IngestConfig {
    /// Builds a configuration from the process environment on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.github_token = std::env::var("REPODIGEST_GITHUB_TOKEN")
            .or_else(|_| std::env::var("GITHUB_TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty());

        if let Ok(dir) = std::env::var("REPODIGEST_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        if let Ok(minutes) = std::env::var("REPODIGEST_CACHE_TTL_MINUTES") {
            match minutes.parse::<u64>() {
                Ok(minutes) => config.cache_ttl = ttl_from_minutes(minutes),
                Err(e) => tracing::warn!(
                    "Ignoring invalid REPODIGEST_CACHE_TTL_MINUTES '{}': {}",
                    minutes,
                    e
                ),
            }
        }

        if let Ok(dir) = std::env::var("REPODIGEST_WORKDIR") {
            config.working_copy_root = PathBuf::from(dir);
        }

        config
    }

    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.github_token = token;
        }
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        self
    }

    pub fn with_cache_ttl_minutes(mut self, minutes: Option<u64>) -> Self {
        if let Some(minutes) = minutes {
            self.cache_ttl = ttl_from_minutes(minutes);
        }
        self
    }
}

/// Minutes to a duration, saturating instead of overflowing
fn ttl_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_file_size, 1_048_576);
        assert!(config.cache_dir.ends_with(DEFAULT_CACHE_DIR_NAME));
        assert_eq!(config.api_base_url, "https://api.github.com");
    }

    #[test]
    fn test_overrides_only_apply_when_present() {
        let config = IngestConfig::default()
            .with_github_token(None)
            .with_cache_dir(Some(PathBuf::from("/tmp/digest")))
            .with_cache_ttl_minutes(Some(5));
        assert!(config.github_token.is_none());
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/digest"));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let config = IngestConfig::default().with_cache_ttl_minutes(Some(u64::MAX));
        assert_eq!(config.cache_ttl, Duration::from_secs(u64::MAX));
    }
}
