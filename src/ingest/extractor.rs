//! Recovers individual files from concatenated content
//!
//! Block headers are recognized by a tolerant pattern: a line of ten or more `=`,
//! a `File:` line (any case of the label), and another `=` line, each possibly
//! followed by trailing whitespace or `\r`. A block's text runs up to the next
//! header or the end of the blob, minus the blank line the writer appends.
//!
//! A requested path matches a block when, in order of preference:
//!
//! 1. it equals the declared path
//! 2. its last segment equals the declared path
//! 3. one is a directory suffix of the other (`a.ts` matches `src/a.ts`)
//!
//! Paths that match nothing are left out of the result without an error.

use once_cell::sync::Lazy;
use regex::Regex;

use super::local_repository::content::{MIN_DELIMITER_LEN, push_block};
use super::snapshot::FileContent;

static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^={{{min},}}[ \t]*\r?\n(?i:file):[ \t]*(.+?)[ \t]*\r?\n={{{min},}}[ \t]*\r?\n",
        min = MIN_DELIMITER_LEN
    ))
    .expect("valid block header regex")
});

/// One block of concatenated content, borrowing from the source blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Splits concatenated content into its blocks, in document order
pub fn parse_blocks(content: &str) -> Vec<Block<'_>> {
    let headers: Vec<(usize, usize, &str)> = BLOCK_HEADER
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let path = caps.get(1)?.as_str();
            Some((whole.start(), whole.end(), path))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(index, (_, body_start, path))| {
            let body_end = headers
                .get(index + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(content.len());
            Block {
                path,
                content: strip_block_terminator(&content[*body_start..body_end]),
            }
        })
        .collect()
}

fn strip_block_terminator(body: &str) -> &str {
    body.strip_suffix("\r\n\r\n")
        .or_else(|| body.strip_suffix("\n\n"))
        .or_else(|| body.strip_suffix("\r\n"))
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

fn normalize_request(path: &str) -> &str {
    path.trim().trim_start_matches("./").trim_start_matches('/')
}

fn match_tier(requested: &str, declared: &str) -> Option<u8> {
    if requested == declared {
        return Some(0);
    }
    if requested.rsplit('/').next() == Some(declared) {
        return Some(1);
    }
    if declared.ends_with(&format!("/{}", requested)) || requested.ends_with(&format!("/{}", declared)) {
        return Some(2);
    }
    None
}

/// Whether `requested` resolves to the block declared as `declared` under any tier
pub fn resolves_to(requested: &str, declared: &str) -> bool {
    match_tier(normalize_request(requested), declared).is_some()
}

fn find_block<'b, 'a>(blocks: &'b [Block<'a>], requested: &str) -> Option<&'b Block<'a>> {
    let requested = normalize_request(requested);
    if requested.is_empty() {
        return None;
    }
    blocks
        .iter()
        .filter_map(|block| match_tier(requested, block.path).map(|tier| (tier, block)))
        // min_by_key keeps the first block of the best tier
        .min_by_key(|(tier, _)| *tier)
        .map(|(_, block)| block)
}

/// Returns the requested files in request order
///
/// Each block appears at most once even if several requested paths resolve to it.
pub fn extract_files(content: &str, paths: &[String]) -> Vec<FileContent> {
    let blocks = parse_blocks(content);
    let mut files: Vec<FileContent> = Vec::new();

    for requested in paths {
        match find_block(&blocks, requested) {
            Some(block) if !files.iter().any(|f| f.path == block.path) => files.push(FileContent {
                path: block.path.to_string(),
                content: block.content.to_string(),
            }),
            Some(_) => {}
            None => tracing::debug!("Requested path '{}' not found in content", requested),
        }
    }

    files
}

/// Serializes files back into concatenated content
pub fn format_files(files: &[FileContent]) -> String {
    let mut out = String::new();
    for file in files {
        push_block(&mut out, &file.path, &file.content);
    }
    out
}

/// Returns the requested files as concatenated content, itself valid extractor input
pub fn extract(content: &str, paths: &[String]) -> String {
    format_files(&extract_files(content, paths))
}
