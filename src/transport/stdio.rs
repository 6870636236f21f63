use std::time::Duration;

use anyhow::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tokio::task::JoinHandle;

use crate::config::IngestConfig;
use crate::tools::RepoDigestTools;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic debug log showing the server is alive; abort the handle to stop it
fn spawn_heartbeat(interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tracing::debug!("heartbeat: server alive");
        }
    })
}

pub async fn run_stdio_server(config: IngestConfig) -> Result<()> {
    let service = RepoDigestTools::from_config(&config)?;

    let server = service.serve(stdio()).await?;
    let heartbeat = spawn_heartbeat(HEARTBEAT_INTERVAL);

    let outcome = server.waiting().await;
    heartbeat.abort();
    tracing::info!("MCP server stopped");

    outcome?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_stops_when_aborted() {
        let heartbeat = spawn_heartbeat(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        heartbeat.abort();
        let joined = heartbeat.await;
        assert!(joined.unwrap_err().is_cancelled());
    }
}
