pub mod git;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use git::GitRunner;

use super::error::{IngestError, IngestResult};
use super::local_repository::LocalRepository;
use super::reference::Reference;
use crate::config::IngestConfig;

/// Working copy manager
///
/// Materializes a [`Reference`] into a directory under `working_copy_root`.
/// The directory name is derived from the normalized URL only, so every ref of a
/// repository shares one working copy, and repeated requests reuse it instead of
/// cloning again.
///
/// A per-directory async mutex guards each working copy. [`materialize`](Self::materialize)
/// acquires it before cloning or checking out and hands it to the returned
/// [`LocalRepository`], so the ref selection and every read through that handle
/// happen under one acquisition. A request for another ref of the same repository
/// waits until the handle is dropped.
pub struct WorkingCopyManager {
    github_token: Option<String>,
    working_copy_root: PathBuf,
    git: GitRunner,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkingCopyManager {
    /// Creates a new WorkingCopyManager
    ///
    /// # Parameters
    ///
    /// * `github_token` - Optional token used for cloning private GitHub repositories
    /// * `working_copy_root` - Parent directory of all working copies. Created when missing.
    /// * `git_timeout` - Upper bound for each git subprocess
    pub fn new(
        github_token: Option<String>,
        working_copy_root: PathBuf,
        git_timeout: Duration,
    ) -> IngestResult<Self> {
        if !working_copy_root.exists() {
            std::fs::create_dir_all(&working_copy_root).map_err(|e| {
                IngestError::Clone(format!(
                    "Failed to create working copy directory {}: {}",
                    working_copy_root.display(),
                    e
                ))
            })?;
        } else if !working_copy_root.is_dir() {
            return Err(IngestError::Clone(format!(
                "Specified path '{}' is not a directory",
                working_copy_root.display()
            )));
        }

        Ok(Self {
            github_token,
            working_copy_root,
            git: GitRunner::new(git_timeout),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        Self::new(
            config.github_token.clone(),
            config.working_copy_root.clone(),
            config.git_timeout,
        )
    }

    pub fn working_copy_root(&self) -> &Path {
        &self.working_copy_root
    }

    /// Deterministic working copy directory for the reference's base URL
    pub fn working_copy_path(&self, reference: &Reference) -> PathBuf {
        self.working_copy_root.join(reference.working_copy_name())
    }

    /// URL to fetch additional refs from, authenticated when a token is configured
    ///
    /// Contains a credential for GitHub references; never log it.
    pub fn fetch_url(&self, reference: &Reference) -> String {
        reference.authenticated_clone_url(self.github_token.as_deref())
    }

    /// Lock of the working copy at `path`
    ///
    /// Entries nobody holds or waits for are dropped on the way, so the map only
    /// tracks working copies in use.
    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Returns a working copy for `reference`, reusing an existing one when its remote matches
    ///
    /// When a ref is requested on a reused copy, the ref is fetched and checked out.
    /// A failure there is logged and the copy is returned at its current ref.
    /// Without a ref, a reused copy is moved to the remote's default branch, and
    /// failing to do so is an [`IngestError::Clone`].
    /// A fresh clone that fails for any reason removes the partially created
    /// directory before returning [`IngestError::Clone`].
    ///
    /// The returned handle keeps the working copy locked until it is dropped.
    pub async fn materialize(&self, reference: &Reference) -> IngestResult<LocalRepository> {
        let repo_dir = self.working_copy_path(reference);
        let checkout = self.lock_for(&repo_dir).lock_owned().await;

        if repo_dir.exists() {
            match self.configured_remote(&repo_dir).await {
                Some(remote) if remote_matches(&remote, reference) => {
                    tracing::info!(
                        "Working copy for {} already exists at {}, reusing",
                        reference.url(),
                        repo_dir.display()
                    );
                    self.switch_ref(&repo_dir, reference).await?;
                    return Ok(LocalRepository::locked(repo_dir, checkout, self.git));
                }
                Some(remote) => tracing::warn!(
                    "Working copy at {} points to {} instead of {}, recreating",
                    repo_dir.display(),
                    remote,
                    reference.url()
                ),
                None => tracing::warn!(
                    "Directory {} is not a usable working copy, recreating",
                    repo_dir.display()
                ),
            }
            remove_dir(&repo_dir).map_err(IngestError::Clone)?;
        }

        match self.clone_fresh(&repo_dir, reference).await {
            Ok(()) => Ok(LocalRepository::locked(repo_dir, checkout, self.git)),
            Err(e) => {
                if let Err(cleanup) = remove_dir(&repo_dir) {
                    tracing::error!("{}", cleanup);
                }
                Err(IngestError::Clone(e))
            }
        }
    }

    async fn configured_remote(&self, repo_dir: &Path) -> Option<String> {
        if !repo_dir.join(".git").exists() {
            return None;
        }
        match self
            .git
            .run(Some(repo_dir), &["config", "--get", "remote.origin.url"])
            .await
        {
            Ok(remote) if !remote.is_empty() => Some(remote),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Failed to read remote of {}: {}", repo_dir.display(), e);
                None
            }
        }
    }

    /// Moves a reused working copy to the requested ref, or to the default branch
    async fn switch_ref(&self, repo_dir: &Path, reference: &Reference) -> IngestResult<()> {
        let fetch_url = self.fetch_url(reference);
        let Some(ref_name) = reference.ref_name() else {
            return self.checkout_default_branch(repo_dir, &fetch_url).await;
        };

        let fetched = match self
            .git
            .run(
                Some(repo_dir),
                &["fetch", "--depth", "1", "--end-of-options", &fetch_url, ref_name],
            )
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to fetch ref '{}': {}", ref_name, e);
                false
            }
        };

        // After a successful fetch FETCH_HEAD is exactly the requested ref, local
        // branches of the same name may be stale
        let target = if fetched { "FETCH_HEAD" } else { ref_name };
        if let Err(e) = self.checkout_detached(repo_dir, target).await {
            tracing::warn!(
                "Could not switch {} to '{}', keeping current ref: {}",
                repo_dir.display(),
                ref_name,
                e
            );
        }
        Ok(())
    }

    /// Fetches the remote HEAD and checks it out
    ///
    /// A copy first cloned at a branch has no `origin/HEAD`, so the default branch
    /// is always asked from the remote.
    async fn checkout_default_branch(&self, repo_dir: &Path, fetch_url: &str) -> IngestResult<()> {
        let result = match self
            .git
            .run(
                Some(repo_dir),
                &["fetch", "--depth", "1", "--end-of-options", fetch_url, "HEAD"],
            )
            .await
        {
            Ok(_) => self.checkout_detached(repo_dir, "FETCH_HEAD").await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            IngestError::Clone(format!(
                "Could not move {} to the default branch: {}",
                repo_dir.display(),
                e
            ))
        })
    }

    async fn checkout_detached(&self, repo_dir: &Path, target: &str) -> Result<(), String> {
        self.git
            .run(
                Some(repo_dir),
                &["checkout", "--force", "--quiet", "--detach", "--end-of-options", target],
            )
            .await
            .map(|_| ())
    }

    async fn clone_fresh(&self, repo_dir: &Path, reference: &Reference) -> Result<(), String> {
        std::fs::create_dir_all(&self.working_copy_root)
            .map_err(|e| format!("Failed to create base working copy directory: {}", e))?;

        let clone_url = self.fetch_url(reference);
        let target = repo_dir.to_string_lossy().to_string();
        tracing::info!("Cloning {} into {}", reference.url(), repo_dir.display());

        match reference.ref_name() {
            None => {
                self.git
                    .run(None, &["clone", "--depth", "1", "--quiet", &clone_url, &target])
                    .await?;
            }
            Some(ref_name) => {
                let shallow = self
                    .git
                    .run(
                        None,
                        &[
                            "clone", "--depth", "1", "--quiet", "--branch", ref_name, &clone_url,
                            &target,
                        ],
                    )
                    .await;

                // --branch only accepts branch and tag names; commits need a full clone
                if let Err(e) = shallow {
                    tracing::debug!(
                        "Shallow clone at '{}' failed, retrying with full history: {}",
                        ref_name,
                        e
                    );
                    remove_dir(repo_dir)?;
                    self.git
                        .run(None, &["clone", "--quiet", &clone_url, &target])
                        .await?;
                    self.checkout_detached(repo_dir, ref_name)
                        .await
                        .map_err(|e| format!("Reference '{}' not found: {}", ref_name, e))?;
                }
            }
        }

        // Never leave the token in .git/config
        if clone_url != reference.clone_url() {
            self.git
                .run(
                    Some(repo_dir),
                    &["remote", "set-url", "origin", &reference.clone_url()],
                )
                .await?;
        }

        if !repo_dir.join(".git").exists() {
            return Err(format!(
                "Repository clone appears to be incomplete at {}",
                repo_dir.display()
            ));
        }
        Ok(())
    }
}

fn remote_matches(remote: &str, reference: &Reference) -> bool {
    match Reference::parse(remote, None) {
        Ok(parsed) => parsed.url() == reference.url(),
        Err(_) => remote == reference.clone_url(),
    }
}

fn remove_dir(dir: &Path) -> Result<(), String> {
    if !dir.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(dir)
        .map_err(|e| format!("Failed to remove directory {}: {}", dir.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_remote_matches_normalized_forms() {
        let reference = Reference::from_str("github:User/Repo").unwrap();
        assert!(remote_matches("https://github.com/user/repo.git", &reference));
        assert!(remote_matches("git@github.com:user/repo.git", &reference));
        assert!(!remote_matches("https://github.com/user/other.git", &reference));
    }

    #[test]
    fn test_working_copy_path_ignores_ref() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkingCopyManager::new(None, root.path().to_path_buf(), Duration::from_secs(5))
                .unwrap();
        let main = Reference::parse("user/repo", Some("main")).unwrap();
        let dev = Reference::parse("user/repo", Some("dev")).unwrap();
        assert_eq!(manager.working_copy_path(&main), manager.working_copy_path(&dev));
        assert!(manager.working_copy_path(&main).starts_with(root.path()));
    }

    #[test]
    fn test_idle_locks_are_dropped() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkingCopyManager::new(None, root.path().to_path_buf(), Duration::from_secs(5))
                .unwrap();

        let held = manager.lock_for(Path::new("/copies/a"));
        drop(manager.lock_for(Path::new("/copies/b")));
        let _c = manager.lock_for(Path::new("/copies/c"));

        let locks = manager.locks.lock().unwrap();
        assert_eq!(locks.len(), 2);
        assert!(locks.contains_key(Path::new("/copies/a")));
        assert!(!locks.contains_key(Path::new("/copies/b")));
        drop(held);
    }

    #[test]
    fn test_root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(WorkingCopyManager::new(None, file, Duration::from_secs(5)).is_err());
    }
}
