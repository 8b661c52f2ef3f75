//! Dependency sandbox installation.
//!
//! Each platform gets its own isolated installation root; a Podfile is
//! rendered from the manifest and `pod install` runs against it as a
//! blocking external process. Installation options are threaded through
//! the rendered Podfile rather than any shared mutable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::platform::PlatformTarget;

/// The single concrete target every generated Podfile declares.
const CONCRETE_TARGET_NAME: &str = "Bin";

/// Framework linkage requested from the dependency installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Dynamic,
    Static,
}

impl Linkage {
    fn podfile_symbol(self) -> &'static str {
        match self {
            Self::Dynamic => ":dynamic",
            Self::Static => ":static",
        }
    }
}

/// An installed, per-platform dependency sandbox.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The `Pods` directory the installer populated.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The generated Xcode project the builder compiles.
    pub fn project_path(&self) -> PathBuf {
        self.root.join("Pods.xcodeproj")
    }

    /// Root of the public-header symlink forest.
    pub fn public_headers_root(&self) -> PathBuf {
        self.root.join("Headers/Public")
    }
}

/// Runs `pod install` against a rendered Podfile.
pub struct PodInstaller<'a> {
    pub sources: &'a [String],
    pub linkage: Linkage,
    pub repo_update: bool,
}

impl PodInstaller<'_> {
    /// Install the manifest's dependency graph for one platform into an
    /// isolated installation root, returning the populated sandbox.
    pub fn install(
        &self,
        target: &PlatformTarget,
        manifest: &PackageManifest,
        installation_root: &Path,
    ) -> Result<Sandbox> {
        fs::create_dir_all(installation_root).map_err(|e| Error::io(installation_root, e))?;

        let podfile = render_podfile(manifest, target, self.sources, self.linkage);
        let podfile_path = installation_root.join("Podfile");
        fs::write(&podfile_path, podfile).map_err(|e| Error::io(&podfile_path, e))?;

        let mut command = Command::new("pod");
        command.arg("install");
        if self.repo_update {
            command.arg("--repo-update");
        }
        let output = command
            .current_dir(installation_root)
            .output()
            .map_err(|e| Error::io(installation_root, e))?;
        if !output.status.success() {
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            eprintln!("{}", combined.trim_end());
            return Err(Error::Build {
                command: format!("pod install (in {})", installation_root.display()),
                status: output.status,
                output: combined,
            });
        }

        Ok(Sandbox::new(installation_root.join("Pods")))
    }
}

/// Render the Podfile for one platform of the manifest.
///
/// Pure function of its inputs; the pipeline never mutates global
/// installer state between platforms.
pub fn render_podfile(
    manifest: &PackageManifest,
    target: &PlatformTarget,
    sources: &[String],
    linkage: Linkage,
) -> String {
    let mut podfile = String::from(
        "install! 'cocoapods', :integrate_targets => false, :deterministic_uuids => false, \
         :warn_for_multiple_pod_sources => false\n",
    );
    for source in sources {
        podfile.push_str(&format!("source '{source}'\n"));
    }
    podfile.push_str(&format!(
        "use_frameworks! :linkage => {}\n",
        linkage.podfile_symbol()
    ));
    match &target.deployment_target {
        Some(version) => podfile.push_str(&format!(
            "platform :{}, '{version}'\n",
            target.platform.key()
        )),
        None => podfile.push_str(&format!("platform :{}\n", target.platform.key())),
    }
    podfile.push_str(&format!(
        "target '{CONCRETE_TARGET_NAME}' do\n  pod '{}', :path => '{}'\nend\n",
        manifest.name(),
        manifest.defined_in().display()
    ));
    podfile
}
