//! Response types for the repository digest MCP server
//!
//! Search results are returned in a compact form grouped by file, with each
//! file's matched and context lines concatenated as `"{line}:{content}"` in line
//! order. Snapshots are returned as plain text: summary first, then the tree.

use serde::{Deserialize, Serialize};

use crate::ingest::{SearchResult, Snapshot};

/// Compact response for the search_code tool
///
/// ```json
/// {
///   "total_results": 2,
///   "matches": [
///     {"file_path": "src/main.rs", "lines": "9:use std::io;\n10:fn main() {\n11:    run();"}
///   ],
///   "query": "main",
///   "repository": "user/repo"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactSearchResponse {
    /// Number of matched lines across all files
    pub total_results: usize,

    pub matches: Vec<CompactFileMatch>,

    pub query: String,

    pub repository: String,
}

/// Lines of one file for the compact response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactFileMatch {
    pub file_path: String,

    /// Format: "{line_number}:{content}\n{line_number}:{content}..."
    pub lines: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CompactSearchResponse {
    /// Groups results by file, keeping the order in which files were first matched
    ///
    /// Lines shared by the context of neighbouring matches appear once.
    pub fn from_results(results: &[SearchResult], query: &str, repository: &str) -> Self {
        let mut grouped: Vec<(String, Option<String>, Vec<(usize, String)>)> = Vec::new();

        for result in results {
            let index = match grouped.iter().position(|(path, _, _)| *path == result.path) {
                Some(index) => index,
                None => {
                    grouped.push((result.path.clone(), result.url.clone(), Vec::new()));
                    grouped.len() - 1
                }
            };
            let lines = &mut grouped[index].2;
            lines.push((result.line, result.content.clone()));
            lines.extend(
                result
                    .context
                    .iter()
                    .map(|context| (context.line, context.content.clone())),
            );
        }

        let matches = grouped
            .into_iter()
            .map(|(file_path, url, mut lines)| {
                lines.sort_by_key(|(line, _)| *line);
                lines.dedup_by_key(|(line, _)| *line);
                CompactFileMatch {
                    file_path,
                    lines: lines
                        .iter()
                        .map(|(line, content)| format!("{}:{}", line, content))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    url,
                }
            })
            .collect();

        Self {
            total_results: results.len(),
            matches,
            query: query.to_string(),
            repository: repository.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize search results: {}", e))
    }
}

/// Summary followed by the directory tree
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    format!(
        "{}\nDirectory structure:\n{}",
        snapshot.summary.to_text(),
        snapshot.tree
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ContextLine;

    fn result(path: &str, line: usize, content: &str, context: &[(usize, &str)]) -> SearchResult {
        SearchResult {
            path: path.to_string(),
            line,
            content: content.to_string(),
            context: context
                .iter()
                .map(|(line, content)| ContextLine {
                    line: *line,
                    content: content.to_string(),
                })
                .collect(),
            url: None,
            repository: Some("user/repo".to_string()),
        }
    }

    #[test]
    fn test_overlapping_context_is_merged_per_file() {
        let results = vec![
            result("src/a.rs", 2, "fn main() {", &[(1, "use x;"), (3, "    main_loop();")]),
            result("src/a.rs", 3, "    main_loop();", &[(2, "fn main() {"), (4, "}")]),
            result("b.rs", 1, "// main", &[]),
        ];
        let response = CompactSearchResponse::from_results(&results, "main", "user/repo");

        assert_eq!(response.total_results, 3);
        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].file_path, "src/a.rs");
        assert_eq!(
            response.matches[0].lines,
            "1:use x;\n2:fn main() {\n3:    main_loop();\n4:}"
        );
        assert_eq!(response.matches[1].lines, "1:// main");
    }
}
