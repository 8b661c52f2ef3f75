//! Safe file staging.
//!
//! Everything placed under the staging tree goes through `stage_file`,
//! which enforces two invariants: a destination never escapes the staging
//! root, and a destination is never written twice. Violations indicate a
//! manifest-authoring defect and abort the run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::archive::{glob_paths, XcArchive};
use crate::builder::run_command;
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::walker;

/// Filename globs tried when a manifest names no license file.
const LICENSE_GLOB_PATTERNS: &[&str] = &["LICENSE*", "LICENCE*", "*-LICENSE*", "*-LICENCE*"];

/// Copies glob-matched trees from a source root into a staging directory.
pub struct StagingEngine<'a> {
    source_root: &'a Path,
    stage_dir: &'a Path,
}

impl<'a> StagingEngine<'a> {
    pub fn new(source_root: &'a Path, stage_dir: &'a Path) -> Self {
        Self {
            source_root,
            stage_dir,
        }
    }

    /// Expand a glob against the source root.
    ///
    /// Directory matches are excluded unless `include_dirs` is set;
    /// staging opts in and descends into them, header resolution does not.
    pub fn relative_glob(&self, pattern: &str, include_dirs: bool) -> Result<Vec<PathBuf>> {
        let matches = glob_paths(&self.source_root.join(pattern))?;
        Ok(matches
            .into_iter()
            .filter(|path| include_dirs || path.is_file())
            .collect())
    }

    /// Stage every file a glob matches, preserving its position relative
    /// to the source root. A match that is a directory contributes its
    /// whole file tree.
    pub fn stage_glob(&self, pattern: &str) -> Result<()> {
        for path in self.expand_to_files(pattern)? {
            self.stage_file(&path)?;
        }
        Ok(())
    }

    /// Expand a glob to the set of files it contributes, descending into
    /// every matched directory.
    fn expand_to_files(&self, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        let mut files = BTreeSet::new();
        for path in self.relative_glob(pattern, true)? {
            if path.is_file() {
                files.insert(path);
            } else {
                for file in glob_paths(&path.join("**").join("*"))? {
                    if file.is_file() {
                        files.insert(file);
                    }
                }
            }
        }
        Ok(files)
    }

    /// Copy one file into the staging tree.
    ///
    /// Fails with a path-escape error when the file's position relative to
    /// the source root starts with a parent component, and with a
    /// collision error when the destination already exists.
    pub fn stage_file(&self, file_path: &Path) -> Result<()> {
        let relative = file_path
            .strip_prefix(self.source_root)
            .map_err(|_| Error::PathEscape {
                path: file_path.to_path_buf(),
            })?;
        if relative
            .components()
            .next()
            .is_some_and(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::PathEscape {
                path: relative.to_path_buf(),
            });
        }

        let destination = self.stage_dir.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        // symlink_metadata so a dangling link at the destination still
        // counts as occupied instead of being written through.
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(Error::Collision { path: destination });
        }
        fs::copy(file_path, &destination).map_err(|e| Error::io(file_path, e))?;
        Ok(())
    }

    /// Stage the manifest's non-compiled assets, once per run.
    pub fn stage_shared_assets(&self, manifest: &PackageManifest) -> Result<()> {
        for attribute in ["vendored_frameworks", "vendored_libraries"] {
            for pattern in manifest.vendored_globs(attribute) {
                self.stage_glob(&pattern)?;
            }
        }
        self.stage_resource_bundles(manifest)?;
        for attribute in ["preserve_paths", "resources"] {
            for pattern in manifest.attribute_globs(attribute) {
                self.stage_glob(&pattern)?;
            }
        }
        self.stage_license(manifest)
    }

    /// Resource-bundle globs may overlap across bundles; the union is
    /// staged once.
    fn stage_resource_bundles(&self, manifest: &PackageManifest) -> Result<()> {
        let mut resource_paths = BTreeSet::new();
        for pattern in manifest.resource_bundle_globs() {
            resource_paths.extend(self.expand_to_files(&pattern)?);
        }
        for path in resource_paths {
            self.stage_file(&path)?;
        }
        Ok(())
    }

    /// Stage the license file unless the manifest embeds inline text.
    ///
    /// An explicit `license.file` wins; otherwise the first match of a
    /// standard license filename glob is used, and staging is skipped when
    /// neither exists.
    fn stage_license(&self, manifest: &PackageManifest) -> Result<()> {
        if manifest.license_text().is_some() {
            return Ok(());
        }
        let license_file = match manifest.license_file() {
            Some(file) => Some(self.source_root.join(file)),
            None => self.default_license_file()?,
        };
        match license_file {
            Some(path) => self.stage_file(&path),
            None => Ok(()),
        }
    }

    fn default_license_file(&self) -> Result<Option<PathBuf>> {
        for pattern in LICENSE_GLOB_PATTERNS {
            if let Some(path) = self.relative_glob(pattern, false)?.into_iter().next() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

/// Overwrite the generated module map inside every archive's framework
/// bundle with synthesized contents.
pub fn rewrite_module_maps(archives: &[XcArchive], contents: &str) -> Result<()> {
    for archive in archives {
        let modules_dir = archive.modules_path();
        fs::create_dir_all(&modules_dir).map_err(|e| Error::io(&modules_dir, e))?;
        let module_map = modules_dir.join("module.modulemap");
        fs::write(&module_map, contents).map_err(|e| Error::io(&module_map, e))?;
    }
    Ok(())
}

/// Bundle one platform's archives into a single xcframework.
///
/// Exactly one packaging-tool invocation per platform: one `-framework`
/// argument per archive, one `-debug-symbols` argument per discovered dSYM
/// directory and symbol-map file, and one `-output` argument.
pub fn assemble_xcframework(archives: &[XcArchive], output_path: &Path) -> Result<String> {
    let mut args = vec!["xcodebuild -create-xcframework".to_string()];
    for archive in archives {
        args.push(format!("-framework {}", archive.framework_path().display()));
        for dsym in archive.dsym_paths()? {
            args.push(format!("-debug-symbols {}", dsym.display()));
        }
        for symbol_map in archive.bcsymbolmap_paths()? {
            args.push(format!("-debug-symbols {}", symbol_map.display()));
        }
    }
    args.push(format!("-output {}", output_path.display()));
    let command = args.join(" ");

    run_command(&command).map_err(|err| match err {
        Error::Build {
            command,
            status,
            output,
        } => Error::Packaging {
            command,
            status,
            output,
        },
        other => other,
    })
}

/// Recursively copy a tree, flattening directory symlinks into real
/// directories. Used for sandbox public-header trees, which are built
/// almost entirely out of symlinks.
pub fn copy_tree_dereferenced(src: &Path, dst: &Path) -> Result<()> {
    for path in walker::walk(src) {
        let path = path?;
        let relative = path.strip_prefix(src).unwrap_or(&path);
        let destination = dst.join(relative);

        let meta = fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;
        let is_dir = if meta.file_type().is_symlink() {
            fs::metadata(&path).map_err(|e| Error::io(&path, e))?.is_dir()
        } else {
            meta.is_dir()
        };

        if is_dir {
            fs::create_dir_all(&destination).map_err(|e| Error::io(&destination, e))?;
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::copy(&path, &destination).map_err(|e| Error::io(&path, e))?;
        }
    }
    Ok(())
}
