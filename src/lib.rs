//! Repository digests for MCP clients
//!
//! This library exposes repository introspection (summary, directory tree, file
//! content, text search and ref diffs) as Model Context Protocol tools. Requests
//! are served from a time-bounded snapshot cache, a local working copy, or the
//! GitHub API when no working copy can be cloned.
//!
//! ## Authentication
//!
//! A GitHub token is optional. It is read from `REPODIGEST_GITHUB_TOKEN`, falling
//! back to `GITHUB_TOKEN`, and can be overridden on the command line.
//!
//! ```bash
//! export REPODIGEST_GITHUB_TOKEN=your_github_token
//! ```
//!
//! - Without token: 60 API requests/hour, public repositories only, no code search fallback
//! - With token: 5,000 API requests/hour, private repositories with `repo` scope
//!
//! ## Usage
//!
//! - As an MCP server (STDIN/STDOUT mode), `repodigest-mcp stdio`
//! - From the terminal, `repodigest-cli snapshot github:user/repo`
//! - Directly as a Rust library:
//!
//! ```no_run
//! use repodigest_mcp::config::IngestConfig;
//! use repodigest_mcp::ingest::{Reference, RepositoryIngestor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ingestor = RepositoryIngestor::from_config(&IngestConfig::from_env())?;
//! let reference = Reference::parse("github:tokio-rs/tokio", Some("master"))?;
//! let snapshot = ingestor.fetch_snapshot(&reference).await?;
//! println!("{}", snapshot.tree);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ingest;
pub mod tools;
pub mod transport;
