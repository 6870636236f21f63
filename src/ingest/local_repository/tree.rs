//! Box-drawing directory tree rendering
//!
//! Both the working copy scanner and the remote API fallback build a [`TreeNode`]
//! from relative paths and render it here, so the tree text is identical
//! regardless of where the data came from.
//!
//! ```text
//! ├── README.md
//! └── src
//!     ├── lib.rs
//!     └── main.rs
//! ```

use std::collections::BTreeMap;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// A directory level; children are kept in byte-wise lexicographic order,
/// directories and files merged together
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a `/`-separated relative path, creating intermediate directories
    pub fn insert_path(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into("", &mut out);
        out
    }

    fn render_into(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (index, (name, child)) in self.children.iter().enumerate() {
            let is_last = index + 1 == count;
            out.push_str(prefix);
            out.push_str(if is_last { LAST_BRANCH } else { BRANCH });
            out.push_str(name);
            out.push('\n');

            if !child.is_empty() {
                let child_prefix = format!("{}{}", prefix, if is_last { SPACE } else { VERTICAL });
                child.render_into(&child_prefix, out);
            }
        }
    }
}

/// Renders a tree from relative paths in any order
pub fn render_paths<I, S>(paths: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut root = TreeNode::new();
    for path in paths {
        root.insert_path(path.as_ref());
    }
    root.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_and_directories_sorted_together() {
        let tree = render_paths(["src/a.ts", "README.md", "src"]);
        assert_eq!(tree, "├── README.md\n└── src\n    └── a.ts\n");
    }

    #[test]
    fn test_non_last_subtree_keeps_vertical_bar() {
        let tree = render_paths(["a/x", "a/y", "b"]);
        assert_eq!(tree, "├── a\n│   ├── x\n│   └── y\n└── b\n");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let first = render_paths(["z", "m/n/o", "a", "m/b"]);
        let second = render_paths(["m/b", "a", "m/n/o", "z"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(render_paths(Vec::<String>::new()), "");
    }
}
