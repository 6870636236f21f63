use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repodigest_mcp::config::IngestConfig;
use repodigest_mcp::ingest::{Reference, RepositoryIngestor};
use repodigest_mcp::tools::responses::format_snapshot;

#[derive(Parser)]
#[command(author, version = "0.1.0", about = "Repository digest CLI: summaries, files, search and diffs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// GitHub API token for authentication (overrides REPODIGEST_GITHUB_TOKEN environment variable)
    #[arg(short = 't', long, global = true)]
    github_token: Option<String>,

    /// Directory for cached snapshots (overrides REPODIGEST_CACHE_DIR)
    #[arg(short = 'c', long = "cache-dir", global = true)]
    cache_dir: Option<PathBuf>,

    /// Snapshot expiry in minutes (overrides REPODIGEST_CACHE_TTL_MINUTES)
    #[arg(long, global = true)]
    cache_ttl_minutes: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the summary and directory tree of a repository
    Snapshot {
        #[arg(
            help = "Repository - supports 'https://github.com/user/repo', 'git@github.com:user/repo.git', 'github:user/repo', 'user/repo', other git URLs or local paths"
        )]
        repository: String,

        /// Branch, commit or tag (default is the repository's default branch)
        #[arg(short, long)]
        ref_name: Option<String>,

        /// Also print the concatenated file content
        #[arg(long)]
        content: bool,
    },
    /// Print the contents of files
    Files {
        repository: String,

        /// Paths or bare file names
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(short, long)]
        ref_name: Option<String>,

        /// Print a JSON array of {path, content} objects
        #[arg(long)]
        json: bool,
    },
    /// Search the lines of every file
    Search {
        repository: String,

        /// Case-insensitive regular expression, or literal text
        query: String,

        #[arg(short, long)]
        ref_name: Option<String>,

        /// Maximum number of matched lines
        #[arg(short = 'n', long, default_value = "20")]
        max_results: usize,
    },
    /// Print the diff between two refs
    Diff {
        repository: String,
        base: String,
        head: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = IngestConfig::from_env()
        .with_github_token(cli.github_token)
        .with_cache_dir(cli.cache_dir)
        .with_cache_ttl_minutes(cli.cache_ttl_minutes);
    let ingestor = RepositoryIngestor::from_config(&config)?;

    match cli.command {
        Commands::Snapshot {
            repository,
            ref_name,
            content,
        } => {
            let reference = Reference::parse(&repository, ref_name.as_deref())?;
            let snapshot = ingestor.fetch_snapshot(&reference).await?;
            println!("{}", format_snapshot(&snapshot));
            if content {
                println!("{}", snapshot.content);
            }
            Ok(())
        }
        Commands::Files {
            repository,
            paths,
            ref_name,
            json,
        } => {
            let reference = Reference::parse(&repository, ref_name.as_deref())?;
            if json {
                let files = ingestor.get_files_as_objects(&reference, &paths).await?;
                println!("{}", serde_json::to_string_pretty(&files)?);
                if files.len() < paths.len() {
                    eprintln!("{} of {} paths not found.", paths.len() - files.len(), paths.len());
                }
            } else {
                let content = ingestor.get_files_content(&reference, &paths).await?;
                if content.is_empty() {
                    eprintln!("No matching files found.");
                }
                print!("{}", content);
            }
            Ok(())
        }
        Commands::Search {
            repository,
            query,
            ref_name,
            max_results,
        } => {
            let reference = Reference::parse(&repository, ref_name.as_deref())?;
            let results = ingestor.search(&reference, &query, max_results).await?;
            if results.is_empty() {
                eprintln!("No matches found.");
            }
            // file:line:content, like grep
            for result in &results {
                println!("{}:{}:{}", result.path, result.line, result.content);
            }
            Ok(())
        }
        Commands::Diff {
            repository,
            base,
            head,
        } => {
            let reference = Reference::parse(&repository, None)?;
            let diff = ingestor.diff(&reference, &base, &head).await?;
            println!("{}", diff);
            Ok(())
        }
    }
}
