//! Module-map synthesis from a public-header list.
//!
//! Pure functions: the same header list always produces the same text.
//! Headers are split on `/` and inserted into a trie whose branches become
//! nested `module` blocks and whose leaves become `header`/`export *`
//! declarations, all wrapped in one top-level `framework module` block.

use std::path::{Path, PathBuf};

/// One node of the header trie.
///
/// Sibling order is insertion order, which in turn is the order of the
/// input header list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMapNode {
    /// A public header, holding its original relative path.
    Leaf(String),
    /// A directory level, keyed by normalized identifier.
    Branch(Vec<(String, ModuleMapNode)>),
}

/// Synthesize module-map text for a framework from relative header paths.
pub fn module_map_contents(framework_name: &str, headers: &[String]) -> String {
    let root = build_tree(headers);
    let mut out = String::new();
    out.push_str(&format!("framework module {framework_name} {{\n"));
    if let ModuleMapNode::Branch(children) = &root {
        for (name, node) in children {
            serialize(name, node, 1, &mut out);
        }
    }
    out.push_str("}\n");
    out
}

/// Build the header trie from a relative header-path list.
pub fn build_tree(headers: &[String]) -> ModuleMapNode {
    let mut root = Vec::new();
    for header in headers {
        let header = strip_leading_dot_slash(header);
        if header.is_empty() {
            continue;
        }
        insert(&mut root, header, header);
    }
    ModuleMapNode::Branch(root)
}

/// Re-root absolute public-header paths for trie insertion.
///
/// With a header-mappings root the header keeps its position relative to
/// that root; without one only the file name is used.
pub fn relative_headers(
    public_headers: &[PathBuf],
    header_mappings_root: Option<&Path>,
) -> Vec<String> {
    public_headers
        .iter()
        .filter_map(|path| match header_mappings_root {
            Some(root) => path
                .strip_prefix(root)
                .ok()
                .or_else(|| path.file_name().map(Path::new))
                .map(|p| p.to_string_lossy().into_owned()),
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        })
        .collect()
}

/// Branches are keyed by normalized directory identifier, leaves by the
/// header's full file name, and lookups never cross kinds, so a header and
/// a directory sharing a stem (`Foo.h` next to `Foo/`) cannot shadow each
/// other.
fn insert(children: &mut Vec<(String, ModuleMapNode)>, remaining: &str, full_path: &str) {
    match remaining.split_once('/') {
        Some((dir, rest)) => {
            let key = identifier(dir);
            let index = match children
                .iter()
                .position(|(name, node)| *name == key && matches!(node, ModuleMapNode::Branch(_)))
            {
                Some(index) => index,
                None => {
                    children.push((key, ModuleMapNode::Branch(Vec::new())));
                    children.len() - 1
                }
            };
            if let ModuleMapNode::Branch(grandchildren) = &mut children[index].1 {
                insert(grandchildren, rest, full_path);
            }
        }
        None => {
            let duplicate = children
                .iter()
                .any(|(name, node)| *name == remaining && matches!(node, ModuleMapNode::Leaf(_)));
            if !duplicate {
                children.push((remaining.to_string(), ModuleMapNode::Leaf(full_path.to_string())));
            }
        }
    }
}

fn serialize(name: &str, node: &ModuleMapNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        ModuleMapNode::Leaf(path) => {
            out.push_str(&format!("{indent}header \"{path}\"\n"));
            out.push_str(&format!("{indent}export *\n"));
        }
        ModuleMapNode::Branch(children) => {
            out.push_str(&format!("{indent}module {name} {{\n"));
            for (child_name, child) in children {
                serialize(child_name, child, depth + 1, out);
            }
            out.push_str(&format!("{indent}}}\n"));
        }
    }
}

/// Replace non-identifier characters (`-` and friends) with `_`.
fn identifier(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Remove a single leading `.` and/or `/` from a header path.
fn strip_leading_dot_slash(header: &str) -> &str {
    let header = header.strip_prefix('.').unwrap_or(header);
    header.strip_prefix('/').unwrap_or(header)
}
