//! GitHub API response types
//!
//! Only the fields the fallback path reads are declared; everything else in the
//! responses is ignored by serde.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubRepository {
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub default_branch: String,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubTree {
    pub tree: Vec<GitHubTreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubTreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: Option<u64>,
}

impl GitHubTreeEntry {
    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubContent {
    pub content: Option<String>,
    pub encoding: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCodeSearchResponse {
    pub items: Vec<GitHubCodeSearchItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCodeSearchItem {
    pub path: String,
    pub html_url: Option<String>,
    pub repository: Option<GitHubSearchRepository>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubSearchRepository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCompare {
    pub status: Option<String>,
    #[serde(default)]
    pub ahead_by: u64,
    #[serde(default)]
    pub behind_by: u64,
    #[serde(default)]
    pub commits: Vec<GitHubCompareCommit>,
    #[serde(default)]
    pub files: Vec<GitHubCompareFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCompareCommit {
    pub sha: String,
    pub commit: GitHubCommitDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCommitDetail {
    pub message: String,
    pub author: Option<GitHubCommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCommitAuthor {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubCompareFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    pub previous_filename: Option<String>,
    pub patch: Option<String>,
}
