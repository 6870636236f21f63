use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repodigest_mcp::config::IngestConfig;

#[derive(Parser)]
#[command(author, version = "0.1.0", about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in stdin/stdout mode
    Stdio {
        /// Enable debug logging
        #[arg(short, long)]
        debug: bool,

        /// GitHub API token for authentication (overrides REPODIGEST_GITHUB_TOKEN environment variable)
        #[arg(short = 't', long)]
        github_token: Option<String>,

        /// Directory for cached snapshots (overrides REPODIGEST_CACHE_DIR)
        #[arg(short = 'c', long = "cache-dir")]
        cache_dir: Option<PathBuf>,

        /// Snapshot expiry in minutes (overrides REPODIGEST_CACHE_TTL_MINUTES)
        #[arg(long)]
        cache_ttl_minutes: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stdio {
            debug,
            github_token,
            cache_dir,
            cache_ttl_minutes,
        } => run_stdio_server(debug, github_token, cache_dir, cache_ttl_minutes).await,
    }
}

async fn run_stdio_server(
    debug: bool,
    github_token: Option<String>,
    cache_dir: Option<PathBuf>,
    cache_ttl_minutes: Option<u64>,
) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .init();

    tracing::info!("Starting repository digest MCP server in STDIN/STDOUT mode");
    if github_token.is_some() {
        tracing::info!("Using GitHub token from command line arguments");
    }

    let config = IngestConfig::from_env()
        .with_github_token(github_token)
        .with_cache_dir(cache_dir)
        .with_cache_ttl_minutes(cache_ttl_minutes);

    tracing::info!("Snapshot cache directory: {}", config.cache_dir.display());
    tracing::info!("Working copy directory: {}", config.working_copy_root.display());

    repodigest_mcp::transport::stdio::run_stdio_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("Error running STDIO server: {}", e))
}
