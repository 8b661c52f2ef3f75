//! Build-archive wrapper.
//!
//! An `.xcarchive` is an xcodebuild output directory holding the compiled
//! framework and its debug-symbol bundles for one (platform, variant)
//! invocation. This is a plain value type: every accessor is pure path
//! composition or a fresh glob over the archive directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A completed build archive, discovered by globbing an xcodebuild output
/// directory after a build.
#[derive(Debug, Clone)]
pub struct XcArchive {
    path: PathBuf,
    module_name: String,
}

impl XcArchive {
    pub fn new(path: PathBuf, module_name: &str) -> Self {
        Self {
            path,
            module_name: module_name.to_string(),
        }
    }

    /// Discover every archive under an xcodebuild output directory.
    pub fn discover(xcodebuild_out_dir: &Path, module_name: &str) -> Result<Vec<Self>> {
        let pattern = xcodebuild_out_dir.join("**").join("*.xcarchive");
        let mut archives: Vec<Self> = glob_paths(&pattern)?
            .into_iter()
            .map(|path| Self::new(path, module_name))
            .collect();
        archives.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(archives)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Debug-symbol bundle directories produced alongside the framework.
    pub fn dsym_paths(&self) -> Result<Vec<PathBuf>> {
        glob_paths(&self.path.join("dSYMs").join("*.dSYM"))
    }

    /// Bitcode symbol-map files produced alongside the framework.
    pub fn bcsymbolmap_paths(&self) -> Result<Vec<PathBuf>> {
        glob_paths(&self.path.join("BCSymbolMaps").join("*.bcsymbolmap"))
    }

    /// The built framework bundle inside the archive.
    pub fn framework_path(&self) -> PathBuf {
        self.path
            .join("Products/Library/Frameworks")
            .join(format!("{}.framework", self.module_name))
    }

    /// The module-map directory inside the framework bundle.
    pub fn modules_path(&self) -> PathBuf {
        self.framework_path().join("Modules")
    }

    /// True when the build produced no products at all.
    ///
    /// An archive with an absent or empty `Products` directory is legal
    /// output for a platform the pod has no sources for; the caller skips
    /// staging it rather than failing.
    pub fn is_empty(&self) -> bool {
        let products = self.path.join("Products");
        match fs::read_dir(&products) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

/// Expand a glob pattern into sorted matches.
pub(crate) fn glob_paths(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_str = pattern.to_string_lossy();
    let paths = glob::glob(&pattern_str)
        .map_err(|e| Error::Configuration(format!("bad glob pattern '{pattern_str}': {e}")))?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Error::io(e.path().to_path_buf(), e.into_error()))?;
        matches.push(path);
    }
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovers_archives_recursively() {
        let temp = TempDir::new().unwrap();
        let out = temp.path();
        fs::create_dir_all(out.join("MyLib-simulator.xcarchive/Products")).unwrap();
        fs::create_dir_all(out.join("nested/MyLib-device.xcarchive")).unwrap();
        fs::create_dir_all(out.join("not-an-archive")).unwrap();

        let archives = XcArchive::discover(out, "MyLib").unwrap();
        assert_eq!(archives.len(), 2);
        assert!(archives[0].path().ends_with("MyLib-simulator.xcarchive"));
    }

    #[test]
    fn empty_when_products_missing_or_bare() {
        let temp = TempDir::new().unwrap();
        let archive_dir = temp.path().join("A.xcarchive");
        fs::create_dir_all(&archive_dir).unwrap();
        let archive = XcArchive::new(archive_dir.clone(), "A");
        assert!(archive.is_empty());

        fs::create_dir_all(archive_dir.join("Products")).unwrap();
        assert!(archive.is_empty());

        fs::create_dir_all(archive_dir.join("Products/Library")).unwrap();
        assert!(!archive.is_empty());
    }

    #[test]
    fn framework_and_symbol_paths() {
        let temp = TempDir::new().unwrap();
        let archive_dir = temp.path().join("A.xcarchive");
        fs::create_dir_all(archive_dir.join("dSYMs/MyLib.framework.dSYM")).unwrap();
        fs::create_dir_all(archive_dir.join("BCSymbolMaps")).unwrap();
        fs::write(archive_dir.join("BCSymbolMaps/abc.bcsymbolmap"), "m").unwrap();

        let archive = XcArchive::new(archive_dir.clone(), "MyLib");
        assert_eq!(
            archive.framework_path(),
            archive_dir.join("Products/Library/Frameworks/MyLib.framework")
        );
        assert_eq!(archive.dsym_paths().unwrap().len(), 1);
        assert_eq!(archive.bcsymbolmap_paths().unwrap().len(), 1);
    }
}
