//! Tests for the scanner and the content extractor working together
//!
//! Content written by the scanner must come back unchanged through the
//! extractor, and extracting the extractor's own output must be stable.

mod common;

use repodigest_mcp::ingest::extractor::{extract, extract_files};
use repodigest_mcp::ingest::local_repository::scan::scan_directory;

use common::write_file;

const MAX_FILE_SIZE: u64 = 1024 * 1024;

#[test]
fn test_readme_and_source_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "README.md", "# Hello");
    write_file(dir.path(), "src/a.ts", "x=1");

    let output = scan_directory(dir.path(), MAX_FILE_SIZE).unwrap();

    // R sorts before s: files and directories are ordered together
    assert_eq!(output.tree, "├── README.md\n└── src\n    └── a.ts\n");
    assert_eq!(output.file_count, 2);

    let files = extract_files(&output.content, &["README.md".to_string()]);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "README.md");
    assert_eq!(files[0].content, "# Hello");
}

#[test]
fn test_every_scanned_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let fixtures = [
        ("Cargo.toml", "[package]\nname = \"demo\"\n"),
        ("docs/guide.md", "Heading\n=======\n\nFile: not a block header\n"),
        ("src/lib.rs", "pub fn answer() -> u32 {\n    42\n}\n"),
        ("src/empty.rs", ""),
        ("notes.txt", "trailing blank lines\n\n\n"),
    ];
    for (path, body) in fixtures {
        write_file(dir.path(), path, body);
    }

    let output = scan_directory(dir.path(), MAX_FILE_SIZE).unwrap();
    let requested: Vec<String> = fixtures.iter().map(|(path, _)| path.to_string()).collect();
    let files = extract_files(&output.content, &requested);

    assert_eq!(files.len(), fixtures.len());
    for ((path, body), file) in fixtures.iter().zip(&files) {
        assert_eq!(file.path, *path);
        assert_eq!(file.content, *body, "content of {} changed", path);
    }

    let once = extract(&output.content, &requested);
    let twice = extract(&once, &requested);
    assert_eq!(once, twice);
}

#[test]
fn test_oversized_file_is_replaced_by_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let big = "a".repeat(2 * 1024 * 1024);
    write_file(dir.path(), "big.bin", &big);
    write_file(dir.path(), "small.txt", "ok");

    let output = scan_directory(dir.path(), MAX_FILE_SIZE).unwrap();
    assert_eq!(output.file_count, 2);
    assert!(!output.content.contains(&"a".repeat(1024)));

    let files = extract_files(&output.content, &["big.bin".to_string()]);
    assert!(files[0].content.contains("too large"));
    assert!(files[0].content.contains("2.00 MB"));
}

#[test]
fn test_git_metadata_is_excluded() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "main.rs", "fn main() {}");
    write_file(dir.path(), ".git/config", "[core]");
    write_file(dir.path(), ".gitignore", "target/");

    let output = scan_directory(dir.path(), MAX_FILE_SIZE).unwrap();
    assert_eq!(output.tree, "└── main.rs\n");
    assert_eq!(output.file_count, 1);
    assert!(!output.content.contains("[core]"));
}

#[test]
fn test_basename_requests_resolve_to_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "src/a.ts", "x=1");
    write_file(dir.path(), "README.md", "# Hello");

    let output = scan_directory(dir.path(), MAX_FILE_SIZE).unwrap();
    let files = extract_files(
        &output.content,
        &["a.ts".to_string(), "missing.ts".to_string(), "README.md".to_string()],
    );
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.ts", "README.md"]);
}
