use std::sync::Arc;

use rmcp::{ServerHandler, model::*, schemars, tool};

use crate::config::IngestConfig;
use crate::ingest::{IngestResult, Reference, RepositoryIngestor};

pub mod responses;

use responses::{CompactSearchResponse, format_snapshot};

const DEFAULT_MAX_RESULTS: usize = 20;

/// Repository digest tools exposed through the MCP protocol
///
/// A thin wrapper around [`RepositoryIngestor`]; every tool parses its
/// `repository` and `ref_name` arguments into a [`Reference`] and forwards the
/// call. Failures are returned as plain text.
#[derive(Clone)]
pub struct RepoDigestTools {
    ingestor: Arc<RepositoryIngestor>,
    authenticated: bool,
}

impl RepoDigestTools {
    pub fn new(ingestor: Arc<RepositoryIngestor>, authenticated: bool) -> Self {
        Self {
            ingestor,
            authenticated,
        }
    }

    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        let ingestor = RepositoryIngestor::from_config(config)?;
        Ok(Self::new(Arc::new(ingestor), config.github_token.is_some()))
    }
}

fn parse_reference(repository: &str, ref_name: Option<&str>) -> Result<Reference, String> {
    Reference::parse(repository, ref_name).map_err(|e| e.to_string())
}

#[tool(tool_box)]
impl ServerHandler for RepoDigestTools {
    fn get_info(&self) -> ServerInfo {
        let auth_status = if self.authenticated {
            "Authenticated with GitHub token"
        } else {
            "Not authenticated (rate limits apply, no code search fallback)"
        };

        let instructions = format!(
            "# Repository Digest MCP Server

## Authentication Status
{}

## Available Tools
- `fetch_repository`: Summary and directory tree of a repository
- `get_file_contents`: Contents of specific files
- `search_code`: Line search with surrounding context
- `compare_refs`: Diff between two branches, tags or commits

Repositories are cloned on first use and cached for later requests. When a
repository cannot be cloned, GitHub repositories are answered from the GitHub
API with reduced detail.

## Authentication
```
repodigest-mcp stdio --github-token=your_token
export REPODIGEST_GITHUB_TOKEN=your_github_token
```
",
            auth_status
        );

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(instructions),
        }
    }
}

#[tool(tool_box)]
impl RepoDigestTools {
    #[tool(
        description = "Summarize a repository: name, file count, estimated tokens, GitHub metadata and the full directory tree. Example: `{\"name\": \"fetch_repository\", \"arguments\": {\"repository\": \"github:tokio-rs/tokio\"}}`. With a branch: `{\"name\": \"fetch_repository\", \"arguments\": {\"repository\": \"https://github.com/rust-lang/rust\", \"ref_name\": \"beta\"}}`"
    )]
    async fn fetch_repository(
        &self,
        #[tool(param)]
        #[schemars(
            description = "Repository (required) - 'https://github.com/user/repo', 'git@github.com:user/repo.git', 'github:user/repo', 'user/repo', any git URL, or an absolute path to a local git repository."
        )]
        repository: String,

        #[tool(param)]
        #[schemars(
            description = "Branch, tag or commit (optional, default is the repository's default branch)."
        )]
        ref_name: Option<String>,
    ) -> Result<String, String> {
        let reference = parse_reference(&repository, ref_name.as_deref())?;
        let snapshot = self
            .ingestor
            .fetch_snapshot(&reference)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format_snapshot(&snapshot))
    }

    #[tool(
        description = "Get the contents of files in a repository. Paths may be full relative paths ('src/lib.rs') or bare file names ('lib.rs'). Files that do not exist are left out. Example: `{\"name\": \"get_file_contents\", \"arguments\": {\"repository\": \"github:user/repo\", \"paths\": [\"README.md\", \"src/main.rs\"]}}`"
    )]
    async fn get_file_contents(
        &self,
        #[tool(param)]
        #[schemars(description = "Repository (required), in any format accepted by fetch_repository.")]
        repository: String,

        #[tool(param)]
        #[schemars(description = "Branch, tag or commit (optional).")]
        ref_name: Option<String>,

        #[tool(param)]
        #[schemars(description = "File paths to return (required).")]
        paths: Vec<String>,

        #[tool(param)]
        #[schemars(
            description = "Return a JSON array of {path, content} objects instead of delimited text blocks (optional, default is false)."
        )]
        as_objects: Option<bool>,
    ) -> Result<String, String> {
        if paths.is_empty() {
            return Err("At least one path is required".to_string());
        }
        let reference = parse_reference(&repository, ref_name.as_deref())?;

        if as_objects.unwrap_or(false) {
            let files = self
                .ingestor
                .get_files_as_objects(&reference, &paths)
                .await
                .map_err(|e| e.to_string())?;
            return serde_json::to_string_pretty(&files)
                .map_err(|e| format!("Failed to serialize files: {}", e));
        }

        let content = self
            .ingestor
            .get_files_content(&reference, &paths)
            .await
            .map_err(|e| e.to_string())?;
        if content.is_empty() {
            return Ok(format!(
                "None of the requested files were found in {}: {}",
                reference.display_name(),
                paths.join(", ")
            ));
        }
        Ok(content)
    }

    #[tool(
        description = "Search the lines of every file in a repository. Case-insensitive; the query is a regular expression and falls back to literal text when it is not a valid one. Each result has the line number, the line and two lines of context on each side. Example: `{\"name\": \"search_code\", \"arguments\": {\"repository\": \"github:tokio-rs/tokio\", \"query\": \"async fn spawn\", \"max_results\": 10}}`"
    )]
    async fn search_code(
        &self,
        #[tool(param)]
        #[schemars(description = "Repository (required), in any format accepted by fetch_repository.")]
        repository: String,

        #[tool(param)]
        #[schemars(description = "Branch, tag or commit (optional).")]
        ref_name: Option<String>,

        #[tool(param)]
        #[schemars(description = "Search query (required).")]
        query: String,

        #[tool(param)]
        #[schemars(description = "Maximum number of matched lines to return (optional, default is 20).")]
        max_results: Option<usize>,
    ) -> Result<String, String> {
        let reference = parse_reference(&repository, ref_name.as_deref())?;
        let results = self
            .ingestor
            .search(&reference, &query, max_results.unwrap_or(DEFAULT_MAX_RESULTS))
            .await
            .map_err(|e| e.to_string())?;
        CompactSearchResponse::from_results(&results, &query, &reference.display_name()).to_json()
    }

    #[tool(
        description = "Show the differences between two branches, tags or commits of a repository as a unified diff. Example: `{\"name\": \"compare_refs\", \"arguments\": {\"repository\": \"github:user/repo\", \"base\": \"main\", \"head\": \"feature\"}}`"
    )]
    async fn compare_refs(
        &self,
        #[tool(param)]
        #[schemars(description = "Repository (required), in any format accepted by fetch_repository.")]
        repository: String,

        #[tool(param)]
        #[schemars(description = "Ref the diff starts from (required).")]
        base: String,

        #[tool(param)]
        #[schemars(description = "Ref the diff goes to (required).")]
        head: String,
    ) -> Result<String, String> {
        let reference = parse_reference(&repository, None)?;
        self.ingestor
            .diff(&reference, &base, &head)
            .await
            .map_err(|e| e.to_string())
    }
}
