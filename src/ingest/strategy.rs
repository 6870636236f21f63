//! Ordered fallback between strategies for one operation
//!
//! Each strategy is an async computation. Strategies run strictly one after
//! another; the first success wins and the remaining ones never start. A failure
//! that no fallback can recover (see [`IngestError::is_recoverable`]) ends the
//! chain early.

use std::future::Future;
use std::pin::Pin;

use super::error::{IngestError, IngestResult};

type Attempt<'a, T> = Pin<Box<dyn Future<Output = IngestResult<T>> + Send + 'a>>;

pub struct FallbackChain<'a, T> {
    operation: String,
    attempts: Vec<(&'static str, Attempt<'a, T>)>,
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attempts: Vec::new(),
        }
    }

    /// Appends a strategy, tried only if every earlier one failed
    pub fn then<F>(mut self, name: &'static str, attempt: F) -> Self
    where
        F: Future<Output = IngestResult<T>> + Send + 'a,
    {
        self.attempts.push((name, Box::pin(attempt)));
        self
    }

    /// Runs the strategies in order
    ///
    /// A chain with a single strategy returns that strategy's error unchanged.
    /// Otherwise the failure is [`IngestError::Unavailable`] listing every attempt.
    pub async fn run(self) -> IngestResult<T> {
        let total = self.attempts.len();
        let mut failures: Vec<(&'static str, IngestError)> = Vec::new();

        for (index, (name, attempt)) in self.attempts.into_iter().enumerate() {
            match attempt.await {
                Ok(value) => {
                    if index > 0 {
                        tracing::info!("{} succeeded via {}", self.operation, name);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let terminal = !e.is_recoverable();
                    if index + 1 < total && !terminal {
                        tracing::warn!("{} via {} failed, falling back: {}", self.operation, name, e);
                    } else {
                        tracing::error!("{} via {} failed: {}", self.operation, name, e);
                    }
                    failures.push((name, e));
                    if terminal {
                        break;
                    }
                }
            }
        }

        if failures.len() == 1 {
            if let Some((_, e)) = failures.pop() {
                return Err(e);
            }
        }

        Err(IngestError::Unavailable {
            operation: self.operation,
            attempts: failures
                .into_iter()
                .map(|(name, e)| format!("{}: {}", name, e))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_first_success_stops_the_chain() {
        let later_calls = AtomicUsize::new(0);
        let result = tokio_test::block_on(
            FallbackChain::new("search")
                .then("local", async { Err(IngestError::Clone("offline".into())) })
                .then("remote", async { Ok(7) })
                .then("never", async {
                    later_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(0)
                })
                .run(),
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_strategy_keeps_its_error() {
        let result: IngestResult<()> = tokio_test::block_on(
            FallbackChain::new("diff")
                .then("local", async { Err(IngestError::Diff("bad ref".into())) })
                .run(),
        );
        assert!(matches!(result, Err(IngestError::Diff(_))));
    }

    #[test]
    fn test_terminal_error_ends_the_chain() {
        let later_calls = AtomicUsize::new(0);
        let result: IngestResult<u8> = tokio_test::block_on(
            FallbackChain::new("snapshot")
                .then("remote", async { Err(IngestError::RemoteApi("401".into())) })
                .then("never", async {
                    later_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .run(),
        );
        assert!(matches!(result, Err(IngestError::RemoteApi(_))));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_failures_are_collected() {
        let result: IngestResult<()> = tokio_test::block_on(
            FallbackChain::new("snapshot")
                .then("local", async { Err(IngestError::Clone("no network".into())) })
                .then("remote", async { Err(IngestError::RemoteApi("403".into())) })
                .run(),
        );
        match result {
            Err(IngestError::Unavailable { operation, attempts }) => {
                assert_eq!(operation, "snapshot");
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("local: "));
                assert!(attempts[1].contains("403"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
