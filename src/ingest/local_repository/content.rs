//! Concatenated content format
//!
//! Every file becomes one block:
//!
//! ```text
//! ================================================
//! File: src/main.rs
//! ================================================
//! <file text>
//!
//! ```
//!
//! This is the only interchange format between the scanner and the extractor.
//! The delimiter is long enough that ordinary source text does not produce a
//! `=`-line followed by a `File:` line followed by another `=`-line.

/// Delimiter line written around each block header
pub const DELIMITER: &str = "================================================";

/// Shortest `=` run the extractor accepts as a delimiter
pub const MIN_DELIMITER_LEN: usize = 10;

/// Appends one file block to `out`
pub fn push_block(out: &mut String, path: &str, content: &str) {
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str("File: ");
    out.push_str(path);
    out.push('\n');
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(content);
    out.push_str("\n\n");
}

pub fn format_block(path: &str, content: &str) -> String {
    let mut out = String::with_capacity(content.len() + path.len() + 2 * DELIMITER.len() + 12);
    push_block(&mut out, path, content);
    out
}

/// Text that replaces the body of a file above the size ceiling
pub fn too_large_placeholder(size_bytes: u64) -> String {
    format!(
        "[Content omitted: file too large ({:.2} MB)]",
        size_bytes as f64 / (1024.0 * 1024.0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layout() {
        let block = format_block("README.md", "# Hello");
        assert_eq!(
            block,
            format!("{d}\nFile: README.md\n{d}\n# Hello\n\n", d = DELIMITER)
        );
        assert!(DELIMITER.len() >= MIN_DELIMITER_LEN);
    }

    #[test]
    fn test_placeholder_reports_size_in_mib() {
        let placeholder = too_large_placeholder(2 * 1024 * 1024);
        assert!(placeholder.contains("too large"));
        assert!(placeholder.contains("2.00"));
    }
}
