//! Working copy scanner
//!
//! Walks a directory depth-first with entries sorted by name, skipping every
//! entry whose name starts with `.git` (`.git`, `.gitignore`, `.github`, ...),
//! and produces the tree rendering, the file count and the concatenated content
//! in a single pass. The scan never writes to the directory.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::content::{push_block, too_large_placeholder};
use super::tree::TreeNode;
use crate::ingest::error::{IngestError, IngestResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub tree: String,
    pub file_count: usize,
    pub content: String,
}

fn is_excluded_name(name: &str) -> bool {
    name.starts_with(".git")
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_excluded_name(&entry.file_name().to_string_lossy())
}

/// Whether any segment of a `/`-separated relative path is excluded from scans
///
/// Applies the walk's exclusion to paths listed by other sources, such as a
/// remote tree listing.
pub fn is_excluded_path(relative: &str) -> bool {
    relative.split('/').any(is_excluded_name)
}

/// Deterministic walk shared by the scanner and the search engine
///
/// Yields every non-excluded entry below `root` (the root itself is skipped).
/// Entry errors are logged and skipped.
pub fn repository_entries(root: &Path) -> impl Iterator<Item = DirEntry> + use<> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
}

/// `/`-separated path of `path` relative to `root`
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scans `root` into tree, file count and concatenated content
///
/// Files larger than `max_file_size` bytes get a placeholder block. A file that
/// cannot be read is logged and left out of the content, the scan continues.
pub fn scan_directory(root: &Path, max_file_size: u64) -> IngestResult<ScanOutput> {
    if !root.is_dir() {
        return Err(IngestError::Scan(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut tree = TreeNode::new();
    let mut file_count = 0;
    let mut content = String::new();

    for entry in repository_entries(root) {
        let relative = relative_path(root, entry.path());
        tree.insert_path(&relative);

        if !entry.file_type().is_file() {
            continue;
        }
        file_count += 1;

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                tracing::warn!("Skipping {}: failed to read metadata: {}", relative, e);
                continue;
            }
        };

        if size > max_file_size {
            push_block(&mut content, &relative, &too_large_placeholder(size));
            continue;
        }

        match std::fs::read(entry.path()) {
            Ok(bytes) => push_block(&mut content, &relative, &String::from_utf8_lossy(&bytes)),
            Err(e) => tracing::warn!("Skipping {}: failed to read file: {}", relative, e),
        }
    }

    tracing::debug!("Scanned {} files under {}", file_count, root.display());

    Ok(ScanOutput {
        tree: tree.render(),
        file_count,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::local_repository::content::DELIMITER;

    fn write(root: &Path, relative: &str, body: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_scan_orders_and_excludes_git_entries() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", b"# Hello");
        write(dir.path(), "src/a.ts", b"x=1");
        write(dir.path(), ".git/HEAD", b"ref: refs/heads/main");
        write(dir.path(), ".github/workflows/ci.yml", b"on: push");

        let output = scan_directory(dir.path(), 1024 * 1024).unwrap();

        assert_eq!(output.tree, "├── README.md\n└── src\n    └── a.ts\n");
        assert_eq!(output.file_count, 2);
        assert_eq!(
            output.content,
            format!(
                "{d}\nFile: README.md\n{d}\n# Hello\n\n{d}\nFile: src/a.ts\n{d}\nx=1\n\n",
                d = DELIMITER
            )
        );
    }

    #[test]
    fn test_excluded_paths() {
        assert!(is_excluded_path(".gitignore"));
        assert!(is_excluded_path(".github/workflows/ci.yml"));
        assert!(is_excluded_path("vendor/lib/.gitattributes"));
        assert!(!is_excluded_path("src/git.rs"));
        assert!(!is_excluded_path("docs/.hidden"));
    }

    #[test]
    fn test_scan_uses_placeholder_for_large_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.bin", &vec![b'a'; 2 * 1024 * 1024]);

        let output = scan_directory(dir.path(), 1024 * 1024).unwrap();

        assert_eq!(output.file_count, 1);
        assert!(output.content.contains("too large"));
        assert!(output.content.contains("2.00 MB"));
        assert!(!output.content.contains("aaaa"));
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(matches!(
            scan_directory(&missing, 1024),
            Err(IngestError::Scan(_))
        ));
    }
}
