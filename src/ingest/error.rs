//! Error types for the ingestion pipeline
//!
//! Each variant corresponds to one stage of the pipeline. Whether an error is
//! recovered locally, handed to a fallback, or surfaced depends on the stage:
//!
//! - [`IngestError::Cache`] is always recovered and degrades to a cache miss
//! - [`IngestError::Clone`], [`IngestError::Scan`], [`IngestError::Search`] and
//!   [`IngestError::Diff`] are recovered by the remote API fallback when one is available
//! - [`IngestError::RemoteApi`] and [`IngestError::InvalidReference`] are terminal
//!
//! All variants render as plain descriptive text; the protocol layer wraps that
//! text into its own response envelope.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid repository reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Failed to clone repository: {0}")]
    Clone(String),

    #[error("Failed to scan repository: {0}")]
    Scan(String),

    #[error("Code search failed: {0}")]
    Search(String),

    #[error("Failed to compute diff: {0}")]
    Diff(String),

    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// Every strategy of a fallback chain failed
    #[error("{operation} failed: {}", .attempts.join("; "))]
    Unavailable {
        operation: String,
        attempts: Vec<String>,
    },
}

impl IngestError {
    pub fn invalid_reference(input: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::InvalidReference {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Whether a documented fallback exists for this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::Cache(_)
                | IngestError::Clone(_)
                | IngestError::Scan(_)
                | IngestError::Search(_)
                | IngestError::Diff(_)
        )
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_lists_every_attempt() {
        let err = IngestError::Unavailable {
            operation: "search".to_string(),
            attempts: vec![
                "local: Code search failed: directory vanished".to_string(),
                "remote: Remote API error: 403".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("search failed: "));
        assert!(message.contains("directory vanished; remote"));
    }

    #[test]
    fn test_remote_api_error_is_terminal() {
        assert!(!IngestError::RemoteApi("404".into()).is_recoverable());
        assert!(!IngestError::invalid_reference("x", "bad ref").is_recoverable());
        assert!(IngestError::Clone("unreachable".into()).is_recoverable());
    }
}
