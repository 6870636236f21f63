//! Remote API fallback
//!
//! When no working copy can be produced, the read operations are answered from
//! the GitHub REST API instead. The results differ from the
//! working copy path in two ways:
//!
//! - Snapshot content holds only a fixed allowlist of important root files
//!   (README, manifests, license); the full repository content is not fetched.
//! - Search results carry the whole matched file as context instead of two
//!   lines on each side, since the code search endpoint does not report lines.
//!
//! The tree is rendered with the same [`render_paths`] and the same `.git*`
//! exclusion as the scanner so both paths produce identical tree text.
//!
//! ## Authentication
//!
//! - Without a token, limited to 60 requests/hour and code search is unavailable
//! - With a token, allows 5,000 requests/hour and private repositories (`repo` scope)

mod models;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::error::{IngestError, IngestResult};
use super::local_repository::content::{push_block, too_large_placeholder};
use super::local_repository::no_differences_message;
use super::local_repository::scan::is_excluded_path;
use super::local_repository::search::build_matcher;
use super::local_repository::tree::render_paths;
use super::reference::{GithubRepo, Reference};
use super::snapshot::{
    ContextLine, FileContent, RepositoryMetadata, SearchResult, Snapshot, Summary,
};
use crate::config::IngestConfig;
use models::*;

const USER_AGENT: &str = "repodigest-mcp/0.1.0 (https://github.com/tacogips/repodigest-mcp)";

/// Root files fetched into a fallback snapshot, in priority order
pub const IMPORTANT_FILES: &[&str] = &[
    "README.md",
    "README.rst",
    "README.txt",
    "README",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    "Makefile",
    "Dockerfile",
    "LICENSE",
];

/// Source of the metadata merged into a locally scanned summary
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Description, stars, forks and last update of the repository
    async fn metadata(&self, reference: &Reference) -> IngestResult<RepositoryMetadata>;
}

/// Read operations answered by a remote query API instead of a working copy
#[async_trait]
pub trait RemoteRepositoryApi: MetadataSource {
    /// Summary, tree and important-file content
    async fn snapshot(&self, reference: &Reference) -> IngestResult<Snapshot>;

    /// Individual files by path; files that cannot be fetched are left out
    async fn file_contents(
        &self,
        reference: &Reference,
        paths: &[String],
    ) -> IngestResult<Vec<FileContent>>;

    async fn search(
        &self,
        reference: &Reference,
        query: &str,
        max_results: usize,
    ) -> IngestResult<Vec<SearchResult>>;

    async fn diff(&self, reference: &Reference, base: &str, head: &str) -> IngestResult<String>;
}

pub struct GithubApiClient {
    client: Client,
    github_token: Option<String>,
    base_url: String,
    max_file_size: u64,
}

impl GithubApiClient {
    /// Creates a client for the API at `base_url`
    ///
    /// # Parameters
    ///
    /// * `github_token` - Optional token sent as `Authorization: token <token>`
    /// * `base_url` - API root, `https://api.github.com` in production
    /// * `timeout` - Upper bound for each request
    /// * `max_file_size` - Files above this size get a placeholder instead of content
    pub fn new(
        github_token: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_file_size: u64,
    ) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::RemoteApi(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            github_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_file_size,
        })
    }

    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        Self::new(
            config.github_token.clone(),
            config.api_base_url.clone(),
            config.http_timeout,
            config.max_file_size,
        )
    }

    fn github_repo(reference: &Reference) -> IngestResult<&GithubRepo> {
        reference.github().ok_or_else(|| {
            IngestError::RemoteApi(format!(
                "Remote API fallback is only available for GitHub repositories, not {}",
                reference.url()
            ))
        })
    }

    /// Sends a GET request to `path` (relative to the API root) and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> IngestResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut req_builder = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = self.github_token.as_ref() {
            req_builder = req_builder.header("Authorization", format!("token {}", token));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| IngestError::RemoteApi(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(text) => text,
                Err(_) => "Unknown error".to_string(),
            };
            return Err(IngestError::RemoteApi(format!(
                "GitHub API error {}: {}",
                status, error_text
            )));
        }

        response.json::<T>().await.map_err(|e| {
            IngestError::RemoteApi(format!("Failed to parse GitHub response: {}", e))
        })
    }

    async fn repository(&self, repo: &GithubRepo) -> IngestResult<GitHubRepository> {
        self.get_json(&format!("/repos/{}/{}", repo.owner, repo.repo))
            .await
    }

    async fn tree(&self, repo: &GithubRepo, ref_name: &str) -> IngestResult<GitHubTree> {
        self.get_json(&format!(
            "/repos/{}/{}/git/trees/{}?recursive=1",
            repo.owner,
            repo.repo,
            urlencoding::encode(ref_name)
        ))
        .await
    }

    /// Decoded text of one file, or a placeholder when it exceeds the size ceiling
    async fn file_text(
        &self,
        repo: &GithubRepo,
        path: &str,
        ref_name: Option<&str>,
    ) -> IngestResult<String> {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut request = format!("/repos/{}/{}/contents/{}", repo.owner, repo.repo, encoded_path);
        if let Some(ref_name) = ref_name {
            request.push_str(&format!("?ref={}", urlencoding::encode(ref_name)));
        }

        let file: GitHubContent = self.get_json(&request).await?;

        if let Some(size) = file.size {
            if size > self.max_file_size {
                return Ok(too_large_placeholder(size));
            }
        }

        match (file.encoding.as_deref(), file.content) {
            (Some("base64"), Some(encoded)) => decode_base64(&encoded),
            (_, Some(raw)) => Ok(raw),
            (_, None) => Err(IngestError::RemoteApi(format!(
                "GitHub returned no content for {}",
                path
            ))),
        }
    }
}

fn decode_base64(encoded: &str) -> IngestResult<String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|e| IngestError::RemoteApi(format!("Failed to decode file content: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn metadata_from(repository: &GitHubRepository) -> RepositoryMetadata {
    RepositoryMetadata {
        description: repository.description.clone(),
        stars: Some(repository.stargazers_count),
        forks: Some(repository.forks_count),
        last_updated: repository
            .pushed_at
            .clone()
            .or_else(|| repository.updated_at.clone()),
        default_branch: Some(repository.default_branch.clone()),
    }
}

/// Important root files present in `entries`, in path order
fn important_paths(entries: &[GitHubTreeEntry]) -> Vec<&str> {
    let mut paths: Vec<&str> = entries
        .iter()
        .filter(|entry| entry.is_blob() && !entry.path.contains('/'))
        .filter(|entry| {
            IMPORTANT_FILES
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&entry.path))
        })
        .map(|entry| entry.path.as_str())
        .collect();
    paths.sort_unstable();
    paths
}

fn render_compare(base: &str, head: &str, compare: &GitHubCompare) -> String {
    if compare.files.is_empty() && compare.commits.is_empty() {
        return no_differences_message(base, head);
    }

    let mut out = format!("Comparing {}...{}\n", base, head);
    if let Some(status) = &compare.status {
        out.push_str(&format!(
            "Status: {} ({} ahead, {} behind)\n",
            status, compare.ahead_by, compare.behind_by
        ));
    }

    if !compare.commits.is_empty() {
        out.push_str(&format!("\nCommits ({}):\n", compare.commits.len()));
        for commit in &compare.commits {
            let short_sha: String = commit.sha.chars().take(7).collect();
            let title = commit.commit.message.lines().next().unwrap_or_default();
            let author = commit
                .commit
                .author
                .as_ref()
                .and_then(|a| a.name.as_deref())
                .unwrap_or("unknown");
            out.push_str(&format!("- {} {} ({})\n", short_sha, title, author));
        }
    }

    out.push_str(&format!("\nFiles changed ({}):\n", compare.files.len()));
    for file in &compare.files {
        let old_path = file.previous_filename.as_deref().unwrap_or(&file.filename);
        out.push_str(&format!(
            "\ndiff --git a/{} b/{}\n# {} (+{} -{})\n",
            old_path, file.filename, file.status, file.additions, file.deletions
        ));
        out.push_str(&format!("--- a/{}\n+++ b/{}\n", old_path, file.filename));
        match &file.patch {
            Some(patch) => {
                out.push_str(patch);
                out.push('\n');
            }
            None => out.push_str("(binary or too large to display)\n"),
        }
    }
    out
}

#[async_trait]
impl MetadataSource for GithubApiClient {
    async fn metadata(&self, reference: &Reference) -> IngestResult<RepositoryMetadata> {
        let repo = Self::github_repo(reference)?;
        let repository = self.repository(repo).await?;
        Ok(metadata_from(&repository))
    }
}

#[async_trait]
impl RemoteRepositoryApi for GithubApiClient {
    async fn snapshot(&self, reference: &Reference) -> IngestResult<Snapshot> {
        let repo = Self::github_repo(reference)?;
        let repository = self.repository(repo).await?;
        let metadata = metadata_from(&repository);
        let ref_name = reference
            .ref_name()
            .unwrap_or(repository.default_branch.as_str())
            .to_string();

        let tree = self.tree(repo, &ref_name).await?;
        if tree.truncated {
            tracing::warn!(
                "GitHub truncated the tree of {}, the rendering is incomplete",
                repository.full_name
            );
        }

        let entries: Vec<&GitHubTreeEntry> = tree
            .tree
            .iter()
            .filter(|entry| !is_excluded_path(&entry.path))
            .collect();
        let tree_text = render_paths(entries.iter().map(|entry| entry.path.as_str()));
        let file_count = entries.iter().filter(|entry| entry.is_blob()).count();

        let mut content = String::new();
        for path in important_paths(&tree.tree) {
            let size = tree
                .tree
                .iter()
                .find(|entry| entry.path == path)
                .and_then(|entry| entry.size);
            if let Some(size) = size.filter(|size| *size > self.max_file_size) {
                push_block(&mut content, path, &too_large_placeholder(size));
                continue;
            }
            match self.file_text(repo, path, Some(&ref_name)).await {
                Ok(text) => push_block(&mut content, path, &text),
                Err(e) => tracing::warn!("Skipping {} in fallback snapshot: {}", path, e),
            }
        }

        tracing::info!(
            "Built fallback snapshot of {} at '{}' from the GitHub API",
            repository.full_name,
            ref_name
        );

        let summary = Summary::new(repo.full_name(), Some(file_count), &content).merge(&metadata);
        Ok(Snapshot::new(summary, tree_text, content))
    }

    async fn file_contents(
        &self,
        reference: &Reference,
        paths: &[String],
    ) -> IngestResult<Vec<FileContent>> {
        let repo = Self::github_repo(reference)?;
        let mut files = Vec::new();
        for path in paths {
            let path = path.trim().trim_start_matches("./").trim_start_matches('/');
            match self.file_text(repo, path, reference.ref_name()).await {
                Ok(content) => files.push(FileContent {
                    path: path.to_string(),
                    content,
                }),
                Err(e) => tracing::warn!("Could not fetch {} from GitHub: {}", path, e),
            }
        }
        Ok(files)
    }

    async fn search(
        &self,
        reference: &Reference,
        query: &str,
        max_results: usize,
    ) -> IngestResult<Vec<SearchResult>> {
        let repo = Self::github_repo(reference)?;
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let full_query = format!("{} repo:{}", query, repo.full_name());
        let response: GitHubCodeSearchResponse = self
            .get_json(&format!(
                "/search/code?q={}&per_page={}",
                urlencoding::encode(&full_query),
                max_results.min(100)
            ))
            .await?;

        let matcher = build_matcher(query).ok();
        let mut results = Vec::new();

        let items = response
            .items
            .into_iter()
            .filter(|item| !is_excluded_path(&item.path))
            .take(max_results);
        for item in items {
            let repository = item
                .repository
                .map(|r| r.full_name)
                .unwrap_or_else(|| repo.full_name());

            let text = match self.file_text(repo, &item.path, reference.ref_name()).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Could not fetch {} for search context: {}", item.path, e);
                    String::new()
                }
            };
            let lines: Vec<&str> = text.lines().collect();
            let matched_index = matcher
                .as_ref()
                .and_then(|m| lines.iter().position(|line| m.is_match(line)))
                .unwrap_or(0);

            let context = lines
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != matched_index)
                .map(|(index, line)| ContextLine {
                    line: index + 1,
                    content: line.to_string(),
                })
                .collect();

            results.push(SearchResult {
                path: item.path,
                line: matched_index + 1,
                content: lines.get(matched_index).map(|l| l.to_string()).unwrap_or_default(),
                context,
                url: item.html_url,
                repository: Some(repository),
            });
        }

        Ok(results)
    }

    async fn diff(&self, reference: &Reference, base: &str, head: &str) -> IngestResult<String> {
        let repo = Self::github_repo(reference)?;
        let compare: GitHubCompare = self
            .get_json(&format!(
                "/repos/{}/{}/compare/{}...{}",
                repo.owner,
                repo.repo,
                urlencoding::encode(base),
                urlencoding::encode(head)
            ))
            .await?;
        Ok(render_compare(base, head, &compare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_with_line_breaks() {
        let encoded = "IyBIZWxs\nbw==\n";
        assert_eq!(decode_base64(encoded).unwrap(), "# Hello");
    }

    #[test]
    fn test_important_paths_only_root_allowlist() {
        let entry = |path: &str, entry_type: &str| GitHubTreeEntry {
            path: path.to_string(),
            entry_type: entry_type.to_string(),
            size: Some(10),
        };
        let entries = vec![
            entry("src", "tree"),
            entry("src/README.md", "blob"),
            entry("readme.md", "blob"),
            entry("Cargo.toml", "blob"),
            entry("main.rs", "blob"),
        ];
        assert_eq!(important_paths(&entries), vec!["Cargo.toml", "readme.md"]);
    }

    #[test]
    fn test_render_compare_without_changes() {
        let compare = GitHubCompare {
            status: Some("identical".to_string()),
            ahead_by: 0,
            behind_by: 0,
            commits: vec![],
            files: vec![],
        };
        assert_eq!(
            render_compare("main", "main", &compare),
            "No differences found between main and main"
        );
    }
}
