//! Snapshot data model
//!
//! A [`Snapshot`] is the combined summary, tree and content of a repository at
//! one point in time. Snapshots are never mutated after construction: a request
//! either reuses a stored snapshot whole or replaces it whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Repository display name, e.g. `user/repo`
    pub repository: String,

    /// Number of regular files, `None` when the source could not count them
    pub file_count: Option<usize>,

    /// Approximate token count of the snapshot content, e.g. `12.4k`
    pub token_estimate: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Summary {
    pub fn new(repository: impl Into<String>, file_count: Option<usize>, content: &str) -> Self {
        Self {
            repository: repository.into(),
            file_count,
            token_estimate: estimate_tokens(content),
            description: None,
            stars: None,
            forks: None,
            last_updated: None,
        }
    }

    /// Merges enrichment metadata into this summary, enrichment winning where both are set
    pub fn merge(mut self, metadata: &RepositoryMetadata) -> Self {
        if metadata.description.is_some() {
            self.description = metadata.description.clone();
        }
        if metadata.stars.is_some() {
            self.stars = metadata.stars;
        }
        if metadata.forks.is_some() {
            self.forks = metadata.forks;
        }
        if metadata.last_updated.is_some() {
            self.last_updated = metadata.last_updated.clone();
        }
        self
    }

    /// Human readable rendering used by the tool surface
    pub fn to_text(&self) -> String {
        let mut text = format!("Repository: {}\n", self.repository);
        match self.file_count {
            Some(count) => text.push_str(&format!("Files analyzed: {}\n", count)),
            None => text.push_str("Files analyzed: unknown\n"),
        }
        text.push_str(&format!("Estimated tokens: {}\n", self.token_estimate));
        if let Some(description) = &self.description {
            text.push_str(&format!("Description: {}\n", description));
        }
        if let Some(stars) = self.stars {
            text.push_str(&format!("Stars: {}\n", stars));
        }
        if let Some(forks) = self.forks {
            text.push_str(&format!("Forks: {}\n", forks));
        }
        if let Some(last_updated) = &self.last_updated {
            text.push_str(&format!("Last updated: {}\n", last_updated));
        }
        text
    }
}

/// Metadata used to enrich a [`Summary`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    pub description: Option<String>,
    pub stars: Option<u64>,
    pub forks: Option<u64>,
    pub last_updated: Option<String>,
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub summary: Summary,
    pub tree: String,
    pub content: String,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(summary: Summary, tree: String, content: String) -> Self {
        Self {
            summary,
            tree,
            content,
            captured_at: Utc::now(),
        }
    }
}

/// One file recovered from concatenated content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

/// A numbered line surrounding a search match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,

    /// 1-based line number of the match
    pub line: usize,

    pub content: String,

    /// Up to two lines before and after the match, in file order, match excluded
    pub context: Vec<ContextLine>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Rough token estimate of `content` (four characters per token)
pub fn estimate_tokens(content: &str) -> String {
    let tokens = content.chars().count() / 4;
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), "0");
        assert_eq!(estimate_tokens(&"a".repeat(400)), "100");
        assert_eq!(estimate_tokens(&"a".repeat(6_000)), "1.5k");
        assert_eq!(estimate_tokens(&"a".repeat(8_400_000)), "2.1M");
    }

    #[test]
    fn test_merge_enrichment_wins() {
        let mut summary = Summary::new("user/repo", Some(3), "abcd");
        summary.description = Some("from scan".to_string());
        summary.stars = Some(1);

        let metadata = RepositoryMetadata {
            description: Some("from api".to_string()),
            stars: None,
            forks: Some(7),
            last_updated: Some("2024-01-01T00:00:00Z".to_string()),
            default_branch: None,
        };

        let merged = summary.merge(&metadata);
        assert_eq!(merged.description.as_deref(), Some("from api"));
        assert_eq!(merged.stars, Some(1));
        assert_eq!(merged.forks, Some(7));
        assert_eq!(merged.file_count, Some(3));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = Summary::new("user/repo", None, "");
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("fileCount").is_some());
        assert!(json.get("tokenEstimate").is_some());
        assert!(json.get("stars").is_none());
    }
}
