//! Remote manifest retrieval and pod source checkout.
//!
//! A manifest given as an HTTP(S) URL is downloaded into a temporary
//! directory before loading; its pod source is then checked out from the
//! manifest's git descriptor so relative globs have a tree to resolve
//! against. Local manifests skip both steps.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;

/// Network timeout for podspec downloads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a manifest argument names a remote podspec.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Download a remote podspec into `dest_dir`, returning the local path.
pub fn fetch_podspec(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            reason: "URL has no file name component".to_string(),
        })?;

    let body = http_agent()
        .get(url)
        .call()
        .map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .into_body()
        .read_to_string()
        .map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    fs::create_dir_all(dest_dir).map_err(|e| Error::io(dest_dir, e))?;
    let dest = dest_dir.join(file_name);
    fs::write(&dest, body).map_err(|e| Error::io(&dest, e))?;
    Ok(dest)
}

/// Check out the manifest's source tree into `dest`.
///
/// Only git descriptors are supported; a tag or branch narrows the clone,
/// a commit is fetched and checked out explicitly.
pub fn checkout_source(manifest: &PackageManifest, dest: &Path) -> Result<()> {
    let source = manifest.source().ok_or_else(|| {
        Error::Configuration(format!(
            "podspec '{}' has no source descriptor to download from",
            manifest.name()
        ))
    })?;
    let git_url = source
        .get("git")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            Error::Configuration(format!(
                "podspec '{}' has a non-git source; only git sources can be checked out",
                manifest.name()
            ))
        })?;
    let reference = ["tag", "branch"]
        .iter()
        .find_map(|key| source.get(*key).and_then(serde_json::Value::as_str));
    let commit = source.get("commit").and_then(serde_json::Value::as_str);

    println!("[pack] downloading {} into {}...", manifest.name(), dest.display());

    let mut clone = Command::new("git");
    clone.arg("clone");
    if commit.is_none() {
        clone.arg("--depth").arg("1");
        if let Some(reference) = reference {
            clone.arg("--branch").arg(reference);
        }
    }
    run_git(clone.arg(git_url).arg(dest), git_url)?;

    if let Some(commit) = commit {
        run_git(
            Command::new("git")
                .arg("-C")
                .arg(dest)
                .arg("checkout")
                .arg(commit),
            git_url,
        )?;
    }
    Ok(())
}

fn run_git(command: &mut Command, url: &str) -> Result<()> {
    let output = command.output().map_err(|e| Error::io(PathBuf::from("git"), e))?;
    if output.status.success() {
        return Ok(());
    }
    Err(Error::Fetch {
        url: url.to_string(),
        reason: format!(
            "git exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    })
}

/// Shared HTTP agent with a request timeout.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://example.com/MyLib.podspec.json"));
        assert!(is_remote("http://example.com/MyLib.podspec.json"));
        assert!(!is_remote("./MyLib.podspec.json"));
        assert!(!is_remote("/pods/MyLib.podspec.json"));
    }

    #[test]
    fn checkout_rejects_non_git_sources() {
        let manifest = PackageManifest::from_json_str(
            r#"{"name": "A", "version": "1.0", "source": {"http": "https://x/archive.zip"}}"#,
            PathBuf::from("A.podspec.json"),
        )
        .unwrap();
        let err = checkout_source(&manifest, Path::new("/tmp/never")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn checkout_rejects_missing_source() {
        let manifest = PackageManifest::from_json_str(
            r#"{"name": "A", "version": "1.0"}"#,
            PathBuf::from("A.podspec.json"),
        )
        .unwrap();
        assert!(checkout_source(&manifest, Path::new("/tmp/never")).is_err());
    }
}
