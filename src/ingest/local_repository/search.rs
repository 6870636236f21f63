//! Line-oriented text search over a working copy
//!
//! The pattern is a case-insensitive regular expression. A pattern that does not
//! compile as a regex is searched for as literal text instead, so queries like
//! `fn main(` still work.
//!
//! Files are visited in the same order as the scanner visits them, and the walk
//! stops as soon as `max_results` matches have been collected.

use std::path::Path;

use regex::{Regex, RegexBuilder};

use super::scan::{relative_path, repository_entries};
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::snapshot::{ContextLine, SearchResult};

/// Lines of context captured on each side of a match
pub const CONTEXT_LINES: usize = 2;

/// Builds the case-insensitive matcher for `pattern`
pub fn build_matcher(pattern: &str) -> IngestResult<Regex> {
    if pattern.is_empty() {
        return Err(IngestError::Search("search pattern is empty".to_string()));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|e| {
            tracing::debug!("Pattern '{}' is not a valid regex ({}), searching literally", pattern, e);
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(true)
                .build()
        })
        .map_err(|e| IngestError::Search(format!("invalid pattern '{}': {}", pattern, e)))
}

/// Collects matches of `matcher` in one file's text, up to `limit`
pub fn search_text(path: &str, text: &str, matcher: &Regex, limit: usize) -> Vec<SearchResult> {
    let lines: Vec<&str> = text.lines().collect();
    let mut results = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if results.len() >= limit {
            break;
        }
        if !matcher.is_match(line) {
            continue;
        }

        let start = index.saturating_sub(CONTEXT_LINES);
        let end = (index + CONTEXT_LINES + 1).min(lines.len());
        let context = (start..end)
            .filter(|i| *i != index)
            .map(|i| ContextLine {
                line: i + 1,
                content: lines[i].to_string(),
            })
            .collect();

        results.push(SearchResult {
            path: path.to_string(),
            line: index + 1,
            content: line.to_string(),
            context,
            url: None,
            repository: None,
        });
    }

    results
}

/// Searches every non-excluded file under `root` no larger than `max_file_size`
///
/// # Returns
///
/// * `Ok(Vec<SearchResult>)` - At most `max_results` matches in walk order; empty when nothing matches
/// * `Err(IngestError::Search)` - The pattern is empty or `root` is not a readable directory
pub fn search_directory(
    root: &Path,
    pattern: &str,
    max_results: usize,
    max_file_size: u64,
) -> IngestResult<Vec<SearchResult>> {
    let matcher = build_matcher(pattern)?;

    if !root.is_dir() {
        return Err(IngestError::Search(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut results = Vec::new();
    if max_results == 0 {
        return Ok(results);
    }

    for entry in repository_entries(root) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_path(root, entry.path());

        match entry.metadata() {
            Ok(metadata) if metadata.len() > max_file_size => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Skipping {}: failed to read metadata: {}", relative, e);
                continue;
            }
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping {}: failed to read file: {}", relative, e);
                continue;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let remaining = max_results - results.len();
        results.extend(search_text(&relative, &text, &matcher, remaining));

        if results.len() >= max_results {
            break;
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_bounded_and_numbered() {
        let text = "one\ntwo\nthree\nfour\nfive\nsix";
        let matcher = build_matcher("FOUR").unwrap();
        let results = search_text("f.txt", text, &matcher, 10);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.line, 4);
        assert_eq!(result.content, "four");
        let numbers: Vec<usize> = result.context.iter().map(|c| c.line).collect();
        assert_eq!(numbers, vec![2, 3, 5, 6]);
    }

    #[test]
    fn test_context_at_file_edges() {
        let matcher = build_matcher("first").unwrap();
        let results = search_text("f.txt", "first\nsecond", &matcher, 10);
        let numbers: Vec<usize> = results[0].context.iter().map(|c| c.line).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let matcher = build_matcher("fn main(").unwrap();
        assert!(matcher.is_match("pub FN MAIN() {}"));
        assert!(build_matcher("").is_err());
    }

    #[test]
    fn test_limit_applies_within_one_file() {
        let matcher = build_matcher("x").unwrap();
        let results = search_text("f.txt", "x\nx\nx\nx", &matcher, 3);
        assert_eq!(results.len(), 3);
    }
}
