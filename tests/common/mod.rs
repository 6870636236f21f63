//! Shared fixtures for integration tests
//!
//! Origin repositories are built with the `git` command line in a temporary
//! directory. Tests that need git check [`git_available`] first and return early
//! when it is missing.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

pub use repodigest_mcp::ingest::repository_manager::git::git_available;

/// Writes `body` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("file has a parent")).expect("create parents");
    std::fs::write(path, body).expect("write file");
}

/// Runs git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Origin repository with two branches
///
/// - `main`: `README.md` ("# Hello\n") and `src/a.ts` ("x=1\n")
/// - `feature`: `main` plus a change to `src/a.ts` ("x=2\n") and a new `src/b.ts`
/// - tag `v1` on the `main` commit
pub fn origin_repository(dir: &Path) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["checkout", "--quiet", "-b", "main"]);
    write_file(dir, "README.md", "# Hello\n");
    write_file(dir, "src/a.ts", "x=1\n");
    git(dir, &["add", "."]);
    git(dir, &["commit", "--quiet", "-m", "initial"]);
    git(dir, &["tag", "v1"]);

    git(dir, &["checkout", "--quiet", "-b", "feature"]);
    write_file(dir, "src/a.ts", "x=2\n");
    write_file(dir, "src/b.ts", "export const b = 1;\n");
    git(dir, &["add", "."]);
    git(dir, &["commit", "--quiet", "-m", "feature work"]);
    git(dir, &["checkout", "--quiet", "main"]);
}
