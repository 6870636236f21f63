//! Repository references
//!
//! A [`Reference`] identifies a repository plus an optional branch, tag or commit.
//! Every accepted input format is normalized to one canonical remote URL so that
//! equivalent inputs share the same cache entry and the same working copy.
//!
//! Accepted formats:
//! - `https://github.com/user/repo`, `https://github.com/user/repo.git`
//! - `https://github.com/user/repo/tree/<ref>`
//! - `git@github.com:user/repo.git`
//! - `github:user/repo`
//! - `user/repo` (GitHub shorthand)
//! - any other `http(s)://` or `ssh://` git remote
//! - `file:///abs/path` or `/abs/path` for a repository on local storage
//!
//! A `#<ref>` suffix selects a ref on any of the above.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::error::{IngestError, IngestResult};

/// Prefix of every working copy directory created by this crate
pub const WORKING_COPY_DIR_PREFIX: &str = "repodigest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum GitProvider {
    #[strum(serialize = "github")]
    Github,
    #[strum(serialize = "git")]
    Generic,
    #[strum(serialize = "local")]
    Local,
}

/// Owner and name of a repository hosted on GitHub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepo {
    pub owner: String,
    pub repo: String,
}

impl GithubRepo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone)]
pub struct Reference {
    url: String,
    ref_name: Option<String>,
    provider: GitProvider,
    github: Option<GithubRepo>,
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.ref_name == other.ref_name
    }
}

impl Eq for Reference {}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.ref_name {
            Some(ref_name) => write!(f, "{}#{}", self.url, ref_name),
            None => write!(f, "{}", self.url),
        }
    }
}

impl std::str::FromStr for Reference {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s, None)
    }
}

impl Reference {
    /// Parses a repository string, with `ref_name` overriding any ref embedded in it
    pub fn parse(input: &str, ref_name: Option<&str>) -> IngestResult<Self> {
        let sanitized = input.trim();
        if sanitized.is_empty() {
            return Err(IngestError::invalid_reference(input, "empty repository"));
        }

        let (location, embedded_ref) = match sanitized.rsplit_once('#') {
            Some((location, r)) if !r.is_empty() => (location, Some(r.to_string())),
            Some((location, _)) => (location, None),
            None => (sanitized, None),
        };

        let mut reference = Self::parse_location(input, location)?;

        let explicit_ref = ref_name
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        if let Some(r) = explicit_ref.or(embedded_ref) {
            validate_ref_name(&r)?;
            reference.ref_name = Some(r);
        }

        tracing::debug!("Repository reference normalized: {} -> {}", input, reference);
        Ok(reference)
    }

    fn parse_location(input: &str, location: &str) -> IngestResult<Self> {
        if let Some(rest) = location.strip_prefix("github:") {
            return Self::github_from_path(input, rest, None);
        }

        if let Some(rest) = location.strip_prefix("git@") {
            let (host, path) = rest.split_once(':').ok_or_else(|| {
                IngestError::invalid_reference(input, "SSH remote is missing ':'")
            })?;
            let host = host.to_ascii_lowercase();
            if host == "github.com" {
                return Self::github_from_path(input, path, None);
            }
            let path = trim_repo_path(path);
            return Ok(Self::generic(format!("https://{}/{}", host, path)));
        }

        if location.starts_with('/') {
            let url = Url::from_directory_path(location)
                .or_else(|_| Url::from_file_path(location))
                .map_err(|_| IngestError::invalid_reference(input, "invalid local path"))?;
            return Ok(Self::local(url));
        }

        if location.contains("://") {
            let url = Url::parse(location)
                .map_err(|e| IngestError::invalid_reference(input, e.to_string()))?;
            return match url.scheme() {
                "file" => Ok(Self::local(url)),
                "http" | "https" | "ssh" | "git" => {
                    let host = url
                        .host_str()
                        .ok_or_else(|| IngestError::invalid_reference(input, "missing host"))?
                        .to_ascii_lowercase();
                    if host == "github.com" || host == "www.github.com" {
                        return Self::github_from_path(input, url.path(), None);
                    }
                    let mut normalized = if url.username().is_empty() {
                        format!("{}://{}", url.scheme(), host)
                    } else {
                        format!("{}://{}@{}", url.scheme(), url.username(), host)
                    };
                    if let Some(port) = url.port() {
                        normalized.push_str(&format!(":{}", port));
                    }
                    let path = trim_repo_path(url.path());
                    if path.is_empty() {
                        return Err(IngestError::invalid_reference(input, "missing repository path"));
                    }
                    normalized.push('/');
                    normalized.push_str(path);
                    Ok(Self::generic(normalized))
                }
                other => Err(IngestError::invalid_reference(
                    input,
                    format!("unsupported scheme '{}'", other),
                )),
            };
        }

        // user/repo shorthand
        if location.split('/').count() == 2 && !location.contains(char::is_whitespace) {
            return Self::github_from_path(input, location, None);
        }

        Err(IngestError::invalid_reference(
            input,
            "expected a git URL, github:user/repo, user/repo or an absolute path",
        ))
    }

    fn github_from_path(input: &str, path: &str, ref_name: Option<String>) -> IngestResult<Self> {
        let path = trim_repo_path(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(IngestError::invalid_reference(
                input,
                "GitHub repository must be given as user/repo",
            ));
        }

        // https://github.com/user/repo/tree/<ref>
        let ref_name = match segments.get(2) {
            Some(&"tree") | Some(&"commit") if segments.len() > 3 => {
                let embedded = segments[3..].join("/");
                validate_ref_name(&embedded)?;
                Some(embedded)
            }
            Some(_) => {
                return Err(IngestError::invalid_reference(
                    input,
                    "GitHub repository must be given as user/repo",
                ));
            }
            None => ref_name,
        };

        let owner = segments[0].to_ascii_lowercase();
        let repo = segments[1].trim_end_matches(".git").to_ascii_lowercase();

        Ok(Self {
            url: format!("https://github.com/{}/{}", owner, repo),
            ref_name,
            provider: GitProvider::Github,
            github: Some(GithubRepo { owner, repo }),
        })
    }

    fn generic(url: String) -> Self {
        Self {
            url,
            ref_name: None,
            provider: GitProvider::Generic,
            github: None,
        }
    }

    fn local(url: Url) -> Self {
        let url = url.as_str().trim_end_matches('/').to_string();
        Self {
            url,
            ref_name: None,
            provider: GitProvider::Local,
            github: None,
        }
    }

    /// Canonical remote URL without any ref
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ref_name(&self) -> Option<&str> {
        self.ref_name.as_deref()
    }

    pub fn provider(&self) -> GitProvider {
        self.provider
    }

    /// GitHub owner/repo, present only for GitHub-hosted references
    pub fn github(&self) -> Option<&GithubRepo> {
        self.github.as_ref()
    }

    /// Same repository at another ref
    pub fn with_ref(&self, ref_name: Option<String>) -> Self {
        Self {
            ref_name,
            ..self.clone()
        }
    }

    /// Short human readable repository name, e.g. `user/repo`
    pub fn display_name(&self) -> String {
        if let Some(github) = &self.github {
            return github.full_name();
        }
        let segments: Vec<&str> = self.url.rsplit('/').filter(|s| !s.is_empty()).take(2).collect();
        match segments.as_slice() {
            [name, parent] if self.provider != GitProvider::Local => format!("{}/{}", parent, name),
            [name, ..] => name.to_string(),
            [] => self.url.clone(),
        }
    }

    /// URL handed to `git clone`
    pub fn clone_url(&self) -> String {
        match self.provider {
            GitProvider::Github => format!("{}.git", self.url),
            GitProvider::Generic | GitProvider::Local => self.url.clone(),
        }
    }

    /// Clone URL with the token embedded for GitHub HTTPS remotes
    ///
    /// The returned URL contains a credential and must never be logged or persisted.
    pub fn authenticated_clone_url(&self, token: Option<&str>) -> String {
        match (token, self.provider) {
            (Some(token), GitProvider::Github) => format!(
                "https://{}:x-oauth-basic@{}",
                token,
                self.clone_url().trim_start_matches("https://")
            ),
            _ => self.clone_url(),
        }
    }

    /// Filesystem-safe cache key, a pure function of the normalized URL and ref
    pub fn cache_key(&self) -> String {
        let raw = match &self.ref_name {
            Some(r) => format!("{}@{}", self.url, r),
            None => self.url.clone(),
        };
        urlencoding::encode(&raw).into_owned()
    }

    /// Deterministic working copy directory name for the base URL
    ///
    /// The ref is not part of the name: all refs of one repository share a working copy.
    pub fn working_copy_name(&self) -> String {
        let slug: String = self
            .display_name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}_{}", WORKING_COPY_DIR_PREFIX, slug, url_hash(&self.url))
    }
}

/// Checks that `ref_name` is a well-formed branch, tag or commit name
///
/// Follows the rules of `git check-ref-format --allow-onelevel`, and additionally
/// rejects a leading `-` so a ref can never be read as a git option.
pub fn validate_ref_name(ref_name: &str) -> IngestResult<()> {
    let reject = |reason: &str| Err(IngestError::invalid_reference(ref_name, reason));

    if ref_name.is_empty() {
        return reject("empty ref name");
    }
    if ref_name.starts_with('-') {
        return reject("ref name must not start with '-'");
    }
    if ref_name == "@" {
        return reject("'@' is not a valid ref name");
    }
    if ref_name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(c))
    {
        return reject("ref name contains a forbidden character");
    }
    if ref_name.contains("..") || ref_name.contains("@{") || ref_name.contains("//") {
        return reject("ref name contains a forbidden sequence");
    }
    if ref_name.starts_with('/') || ref_name.ends_with('/') || ref_name.ends_with('.') {
        return reject("ref name must not start or end with '/' or end with '.'");
    }
    if ref_name
        .split('/')
        .any(|component| component.starts_with('.') || component.ends_with(".lock"))
    {
        return reject("ref name component must not start with '.' or end with '.lock'");
    }
    Ok(())
}

/// 12-character hex digest of a normalized URL
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn trim_repo_path(path: &str) -> &str {
    path.trim_matches('/').trim_end_matches(".git").trim_end_matches('/')
}
