//! Textual diff between two refs of a working copy

use std::path::Path;

use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::reference::validate_ref_name;
use crate::ingest::repository_manager::git::GitRunner;

/// Message returned instead of an empty diff
pub fn no_differences_message(base: &str, head: &str) -> String {
    format!("No differences found between {} and {}", base, head)
}

/// Local name under which a fetched ref is stored
fn fetched_ref_name(ref_name: &str) -> String {
    format!("refs/remotes/origin/{}", ref_name)
}

/// Fetches `base` and `head` from `fetch_url`, then diffs them
///
/// Fetch failures are tolerated because either ref may already exist locally;
/// only a ref that resolves nowhere or a failing `git diff` produce an error.
pub(super) async fn diff_refs(
    git: &GitRunner,
    repo_dir: &Path,
    fetch_url: Option<&str>,
    base: &str,
    head: &str,
) -> IngestResult<String> {
    if let Some(fetch_url) = fetch_url {
        for ref_name in [base, head] {
            let refspec = format!("+{}:{}", ref_name, fetched_ref_name(ref_name));
            if let Err(e) = git
                .run(
                    Some(repo_dir),
                    &["fetch", "--depth", "1", "--end-of-options", fetch_url, &refspec],
                )
                .await
            {
                tracing::debug!("Could not fetch '{}', trying local refs: {}", ref_name, e);
            }
        }
    }

    validate_ref_name(base)?;
    validate_ref_name(head)?;

    let base_commit = resolve_commit(git, repo_dir, base).await?;
    let head_commit = resolve_commit(git, repo_dir, head).await?;

    let diff = git
        .run_raw(repo_dir, &["diff", "--no-color", &base_commit, &head_commit, "--"])
        .await
        .map_err(IngestError::Diff)?;

    if diff.trim().is_empty() {
        Ok(no_differences_message(base, head))
    } else {
        Ok(diff)
    }
}

async fn resolve_commit(git: &GitRunner, repo_dir: &Path, ref_name: &str) -> IngestResult<String> {
    let candidates = [fetched_ref_name(ref_name), ref_name.to_string()];
    for candidate in candidates {
        let rev = format!("{}^{{commit}}", candidate);
        if let Ok(sha) = git
            .run(Some(repo_dir), &["rev-parse", "--verify", "--quiet", &rev])
            .await
        {
            if !sha.is_empty() {
                return Ok(sha);
            }
        }
    }
    Err(IngestError::Diff(format!(
        "reference '{}' not found in {}",
        ref_name,
        repo_dir.display()
    )))
}
