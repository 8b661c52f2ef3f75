//! Depth-first directory traversal that follows symbolic links.
//!
//! A symlink to a directory is yielded once (so a recursive-copy consumer
//! can recreate it as a real directory) and then its target's contents are
//! visited in its place. A symlink whose target does not exist is a
//! traversal error.
//!
//! Cycle detection is branch-local: before following a symlinked directory
//! the walker resolves its canonical path and scans the canonical paths of
//! the ancestors on the current root-to-node branch only. Two unrelated
//! links that resolve to the same real directory are not a cycle; only a
//! link resolving to one of its own ancestors is. Backtracking pops the
//! ancestor frames, so the scan state stays bounded by the tree depth.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Walk `root` depth-first, dereferencing directory symlinks.
///
/// Each call returns a fresh walker; no state is shared between walks.
pub fn walk(root: &Path) -> FollowWalker {
    FollowWalker {
        start: Some(root.to_path_buf()),
        stack: Vec::new(),
    }
}

/// Lazy iterator over the paths under a root, parents before children.
pub struct FollowWalker {
    start: Option<PathBuf>,
    stack: Vec<Frame>,
}

/// One directory on the current branch: its traversal path, its resolved
/// canonical path, and the children not yet visited.
struct Frame {
    path: PathBuf,
    canonical: PathBuf,
    entries: std::vec::IntoIter<PathBuf>,
}

impl Iterator for FollowWalker {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.start.take() {
            return Some(self.visit(root));
        }
        loop {
            let frame = self.stack.last_mut()?;
            match frame.entries.next() {
                Some(child) => return Some(self.visit(child)),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl FollowWalker {
    /// Yield one path, pushing a frame first when it is a directory (real
    /// or symlinked) so its children are visited next.
    fn visit(&mut self, path: PathBuf) -> Result<PathBuf> {
        let meta = fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;

        if meta.file_type().is_symlink() {
            // Stat through the link; a missing target surfaces here.
            let target = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
            if target.is_dir() {
                let canonical = fs::canonicalize(&path).map_err(|e| Error::io(&path, e))?;
                for ancestor in &self.stack {
                    if ancestor.canonical == canonical {
                        return Err(Error::Cycle {
                            link: path,
                            ancestor: ancestor.path.clone(),
                        });
                    }
                }
                self.push_dir(path.clone(), canonical)?;
            }
            return Ok(path);
        }

        if meta.is_dir() {
            // Real directories join the branch too: a deeper link may
            // resolve to one of them.
            let canonical = fs::canonicalize(&path).map_err(|e| Error::io(&path, e))?;
            self.push_dir(path.clone(), canonical)?;
        }
        Ok(path)
    }

    fn push_dir(&mut self, path: PathBuf, canonical: PathBuf) -> Result<()> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| Error::io(&path, e))? {
            let entry = entry.map_err(|e| Error::io(&path, e))?;
            entries.push(entry.path());
        }
        entries.sort();
        self.stack.push(Frame {
            path,
            canonical,
            entries: entries.into_iter(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn collect(root: &Path) -> Result<Vec<PathBuf>> {
        walk(root).collect()
    }

    #[test]
    fn yields_parents_before_children() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/file.txt"), "x").unwrap();

        let paths = collect(root).unwrap();
        let pos = |p: &Path| paths.iter().position(|x| x == p).unwrap();
        assert!(pos(root) < pos(&root.join("a")));
        assert!(pos(&root.join("a")) < pos(&root.join("a/b")));
        assert!(pos(&root.join("a/b")) < pos(&root.join("a/b/file.txt")));
    }

    #[test]
    fn dereferences_symlinked_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/inner.txt"), "x").unwrap();
        fs::create_dir_all(root.join("tree")).unwrap();
        symlink(root.join("real"), root.join("tree/link")).unwrap();

        let paths = collect(&root.join("tree")).unwrap();
        // The link itself is yielded once, then its target's contents.
        assert!(paths.contains(&root.join("tree/link")));
        assert!(paths.contains(&root.join("tree/link/inner.txt")));
        let count = paths
            .iter()
            .filter(|p| p.ends_with("inner.txt"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn symlink_to_file_is_yielded_as_leaf() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("target.txt"), "x").unwrap();
        symlink(root.join("target.txt"), root.join("alias.txt")).unwrap();

        let paths = collect(root).unwrap();
        assert!(paths.contains(&root.join("alias.txt")));
    }

    #[test]
    fn broken_symlink_is_an_error() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        symlink(root.join("missing"), root.join("dangling")).unwrap();

        let result: Result<Vec<_>> = collect(root);
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn link_to_ancestor_is_a_cycle() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        symlink(root.join("a"), root.join("a/b/loop")).unwrap();

        let err = collect(root).unwrap_err();
        match err {
            Error::Cycle { link, ancestor } => {
                assert_eq!(link, root.join("a/b/loop"));
                assert_eq!(ancestor, root.join("a"));
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn sibling_links_to_one_target_are_not_a_cycle() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("shared")).unwrap();
        fs::write(root.join("shared/data.txt"), "x").unwrap();
        fs::create_dir_all(root.join("tree")).unwrap();
        symlink(root.join("shared"), root.join("tree/one")).unwrap();
        symlink(root.join("shared"), root.join("tree/two")).unwrap();

        // Both aliases resolve to the same real directory; neither is an
        // ancestor of the other, so both subtrees are visited.
        let paths = collect(&root.join("tree")).unwrap();
        assert!(paths.contains(&root.join("tree/one/data.txt")));
        assert!(paths.contains(&root.join("tree/two/data.txt")));
    }
}
