//! End-to-end pack pipeline.
//!
//! One run converts a source podspec into a zipped multi-platform binary
//! distribution: per-platform sandbox install, archive builds, xcframework
//! assembly, shared-asset staging, zipping, binary manifest generation and
//! an optional lint of the result. Platforms are processed sequentially
//! and the first error aborts the run.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};

use crate::archive::XcArchive;
use crate::builder::{SettingsCache, SettingsKey, XcodeBuilder};
use crate::error::Error;
use crate::fetch;
use crate::manifest::PackageManifest;
use crate::modulemap;
use crate::platform::{Platform, PlatformTarget};
use crate::preflight;
use crate::sandbox::{Linkage, PodInstaller, Sandbox};
use crate::specgen::SpecGenerator;
use crate::stage::{self, StagingEngine};
use crate::validate;
use crate::zipgen::ZipFileGenerator;

/// Header file extensions considered public headers.
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "ipp", "tpp", "hxx", "def", "inl", "inc"];

/// One pack run's inputs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Path or HTTP(S) URL of the source podspec.
    pub podspec: String,
    /// Base URL the zipped artifact will be uploaded under.
    pub artifact_repo_url: String,
    pub use_static_frameworks: bool,
    pub generate_module_map: bool,
    pub allow_warnings: bool,
    pub repo_update: bool,
    pub out_dir: PathBuf,
    pub skip_validation: bool,
    pub skipped_platforms: Vec<String>,
    pub xcodebuild_opts: Option<String>,
    /// Emit the binary manifest as podspec JSON instead of the Ruby DSL.
    pub use_json: bool,
    pub sources: Vec<String>,
    pub verbose: bool,
}

/// Run the whole pipeline for one podspec.
pub fn run(options: &PackOptions) -> anyhow::Result<()> {
    check_options(options)?;
    preflight::check_host_tools()?;

    let manifest = resolve_manifest(options)?;

    let out_dir = absolutize(&options.out_dir)?;
    let files_dir = out_dir
        .join("files")
        .join(manifest.name())
        .join(manifest.version());
    let zips_dir = out_dir
        .join("zips")
        .join(manifest.name())
        .join(manifest.version());
    let stage_dir = files_dir.join("staged");
    if stage_dir.exists() {
        fs::remove_dir_all(&stage_dir)
            .with_context(|| format!("clearing previous staging dir {}", stage_dir.display()))?;
    }
    fs::create_dir_all(&stage_dir)
        .with_context(|| format!("creating staging dir {}", stage_dir.display()))?;

    let targets = filter_platforms(manifest.available_platforms(), &options.skipped_platforms);
    if targets.is_empty() {
        bail!(
            "every declared platform of '{}' was skipped; nothing to build",
            manifest.name()
        );
    }

    let source_root = manifest.source_root();
    let installer = PodInstaller {
        sources: &options.sources,
        linkage: if options.use_static_frameworks {
            Linkage::Static
        } else {
            Linkage::Dynamic
        },
        repo_update: options.repo_update,
    };

    let mut settings_cache = SettingsCache::new();
    let mut built: Vec<(Platform, String)> = Vec::new();
    for target in &targets {
        let platform = target.platform;
        println!("[pack:{}] installing sandbox...", platform.key());
        let installation_root = files_dir.join("sandbox").join(platform.key());
        let sandbox = installer.install(target, &manifest, &installation_root)?;

        let xcodebuild_out = sandbox.root().join("xcodebuild");
        let project_path = sandbox.project_path();
        let builder = XcodeBuilder::new(
            &project_path,
            options.xcodebuild_opts.as_deref(),
            &xcodebuild_out,
            options.verbose,
        );
        builder.build(platform, manifest.name(), None)?;

        let module_name = manifest.module_name();
        let archives: Vec<XcArchive> = XcArchive::discover(&xcodebuild_out, &module_name)?
            .into_iter()
            .filter(|archive| !archive.is_empty())
            .collect();
        if archives.is_empty() {
            println!(
                "[pack:{}] no artifacts produced for {}, skipping",
                platform.key(),
                platform.display_name()
            );
            continue;
        }

        let staged_platform_path = stage_dir.join(platform.key());
        fs::create_dir_all(&staged_platform_path)
            .with_context(|| format!("creating {}", staged_platform_path.display()))?;

        let product_module_name = if options.generate_module_map {
            let settings = platform_settings(
                &mut settings_cache,
                &builder,
                &sandbox,
                &xcodebuild_out,
                platform,
                manifest.name(),
            )?;
            let product_module_name = settings
                .get("PRODUCT_MODULE_NAME")
                .cloned()
                .unwrap_or_else(|| module_name.clone());

            let headers = public_headers(&manifest, &source_root)?;
            let mappings_root = manifest
                .header_mappings_dir()
                .map(|dir| source_root.join(dir));
            let relative = modulemap::relative_headers(&headers, mappings_root.as_deref());
            let contents = modulemap::module_map_contents(&product_module_name, &relative);
            stage::rewrite_module_maps(&archives, &contents)?;

            let sandbox_headers = sandbox.public_headers_root().join(manifest.name());
            if sandbox_headers.exists() {
                stage::copy_tree_dereferenced(
                    &sandbox_headers,
                    &staged_platform_path.join("Headers"),
                )?;
            }
            product_module_name
        } else {
            module_name
        };

        let artifact_file_name = format!("{product_module_name}.xcframework");
        println!(
            "[pack:{}] assembling {}...",
            platform.key(),
            artifact_file_name
        );
        stage::assemble_xcframework(&archives, &staged_platform_path.join(&artifact_file_name))?;
        built.push((platform, artifact_file_name));
    }

    StagingEngine::new(&source_root, &stage_dir).stage_shared_assets(&manifest)?;

    let zip_path = zips_dir.join(format!("{}.zip", manifest.name()));
    println!("[pack] zipping staged files into {}...", zip_path.display());
    ZipFileGenerator::new(&stage_dir, &zip_path).write(|path| {
        let is_manifest = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains(".podspec"));
        is_manifest || path.is_symlink()
    })?;
    let digest = sha256_file(&zip_path)?;
    let checksum_path = zips_dir.join(format!("{}.zip.sha256", manifest.name()));
    fs::write(
        &checksum_path,
        format!("{digest}  {}.zip\n", manifest.name()),
    )
    .map_err(|e| Error::io(&checksum_path, e))?;
    println!("[pack] zip sha256: {digest}");

    let mut generator =
        SpecGenerator::new(&manifest, &options.artifact_repo_url, &zip_path, !built.is_empty());
    for (platform, artifact_file_name) in &built {
        generator.add_platform(*platform, artifact_file_name);
    }
    let (spec_file_name, spec_text) = if options.use_json {
        (
            format!("{}.podspec.json", manifest.name()),
            generator.generate_json(),
        )
    } else {
        (
            format!("{}.podspec", manifest.name()),
            generator.generate_ruby(),
        )
    };
    let spec_path = stage_dir.join(&spec_file_name);
    fs::write(&spec_path, spec_text).map_err(|e| Error::io(&spec_path, e))?;

    if options.skip_validation {
        println!("[pack] skipping validation");
    } else {
        println!("[pack] validating {}...", spec_file_name);
        validate::validate_manifest(
            &spec_path,
            &options.sources,
            options.allow_warnings,
            options.use_static_frameworks,
        )?;
    }

    println!(
        "[pack] successfully packed {} {}:\n  zip:  {}\n  spec: {}",
        manifest.name(),
        manifest.version(),
        zip_path.display(),
        spec_path.display()
    );
    Ok(())
}

/// Reject contradictory or missing inputs before anything external runs;
/// a remote podspec must not even be downloaded for a run that cannot
/// succeed.
fn check_options(options: &PackOptions) -> crate::error::Result<()> {
    if options.artifact_repo_url.trim().is_empty() {
        return Err(Error::Configuration("artifact repo URL is empty".to_string()));
    }
    Ok(())
}

/// Load the manifest, downloading the podspec and checking out its source
/// tree first when the argument is a URL.
fn resolve_manifest(options: &PackOptions) -> anyhow::Result<PackageManifest> {
    if fetch::is_remote(&options.podspec) {
        let download_dir = env::temp_dir().join("pod-pack").join("podspec");
        let podspec_path = fetch::fetch_podspec(&options.podspec, &download_dir)?;
        let mut manifest = PackageManifest::from_file(&podspec_path)?;

        // A downloaded podspec has no source tree next to it; check one out
        // and re-root the manifest there so relative globs resolve.
        let source_dir = env::temp_dir()
            .join("pod-pack")
            .join("source")
            .join(format!("{}-{}", manifest.name(), manifest.version()));
        if source_dir.exists() {
            fs::remove_dir_all(&source_dir)
                .with_context(|| format!("clearing {}", source_dir.display()))?;
        }
        fetch::checkout_source(&manifest, &source_dir)?;
        let relocated = source_dir.join(
            podspec_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("downloaded.podspec.json")),
        );
        fs::copy(&podspec_path, &relocated).map_err(|e| Error::io(&relocated, e))?;
        manifest.set_defined_in(relocated);
        return Ok(manifest);
    }

    let path = Path::new(&options.podspec);
    if !path.exists() {
        bail!("podspec '{}' does not exist", path.display());
    }
    if path.is_dir() {
        bail!(
            "'{}' is a directory; pass the podspec file itself",
            path.display()
        );
    }
    if !path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains(".podspec"))
    {
        bail!("'{}' does not look like a podspec", path.display());
    }
    Ok(PackageManifest::from_file(&absolutize(path)?)?)
}

/// Drop every platform the user asked to skip.
fn filter_platforms(targets: Vec<PlatformTarget>, skipped: &[String]) -> Vec<PlatformTarget> {
    targets
        .into_iter()
        .filter(|target| {
            let skip = skipped
                .iter()
                .any(|token| target.platform.matches_skip_token(token));
            if skip {
                println!("[pack] skipping {}", target.platform.display_name());
            }
            !skip
        })
        .collect()
}

/// Memoized build-settings query for one platform of the target.
fn platform_settings<'c>(
    cache: &'c mut SettingsCache,
    builder: &XcodeBuilder<'_>,
    sandbox: &Sandbox,
    xcodebuild_out: &Path,
    platform: Platform,
    target: &str,
) -> crate::error::Result<&'c BTreeMap<String, String>> {
    let variant = platform.settings_variant();
    let key = SettingsKey {
        sandbox_root: sandbox.root().to_path_buf(),
        out_dir: xcodebuild_out.to_path_buf(),
        platform,
        target: target.to_string(),
        variant,
    };
    cache.get_or_fetch(key, || builder.build_settings(platform, target, variant))
}

/// Header files the manifest declares public, resolved against the source
/// root in sorted order.
fn public_headers(
    manifest: &PackageManifest,
    source_root: &Path,
) -> crate::error::Result<Vec<PathBuf>> {
    let engine = StagingEngine::new(source_root, source_root);
    let mut headers = Vec::new();
    for pattern in manifest.public_header_globs() {
        for path in engine.relative_glob(&pattern, false)? {
            let is_header = path
                .extension()
                .is_some_and(|ext| HEADER_EXTENSIONS.iter().any(|h| ext.eq_ignore_ascii_case(h)));
            if is_header {
                headers.push(path);
            }
        }
    }
    headers.sort();
    headers.dedup();
    Ok(headers)
}

/// Hex-encoded SHA-256 of a file, streamed rather than slurped.
fn sha256_file(path: &Path) -> crate::error::Result<String> {
    let mut file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("resolving current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn targets() -> Vec<PlatformTarget> {
        Platform::ALL
            .iter()
            .map(|&platform| PlatformTarget {
                platform,
                deployment_target: None,
            })
            .collect()
    }

    #[test]
    fn skip_tokens_filter_case_insensitively() {
        let kept = filter_platforms(targets(), &["iOS".to_string(), " TVOS ".to_string()]);
        let keys: Vec<&str> = kept.iter().map(|t| t.platform.key()).collect();
        assert_eq!(keys, vec!["osx", "watchos"]);
    }

    #[test]
    fn no_skip_tokens_keeps_everything() {
        assert_eq!(filter_platforms(targets(), &[]).len(), Platform::ALL.len());
    }

    #[test]
    fn public_headers_are_filtered_and_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Sources")).unwrap();
        fs::write(root.join("Sources/Zed.h"), "").unwrap();
        fs::write(root.join("Sources/Alpha.hpp"), "").unwrap();
        fs::write(root.join("Sources/impl.m"), "").unwrap();

        let manifest = PackageManifest::from_json_str(
            r#"{"name": "A", "version": "1.0", "source_files": "Sources/**/*"}"#,
            root.join("A.podspec.json"),
        )
        .unwrap();

        let headers = public_headers(&manifest, root).unwrap();
        assert_eq!(
            headers,
            vec![root.join("Sources/Alpha.hpp"), root.join("Sources/Zed.h")]
        );
    }

    #[test]
    fn empty_artifact_repo_url_is_a_configuration_error() {
        let options = PackOptions {
            podspec: "MyLib.podspec.json".to_string(),
            artifact_repo_url: "   ".to_string(),
            use_static_frameworks: false,
            generate_module_map: false,
            allow_warnings: false,
            repo_update: false,
            out_dir: PathBuf::from("."),
            skip_validation: true,
            skipped_platforms: Vec::new(),
            xcodebuild_opts: None,
            use_json: false,
            sources: Vec::new(),
            verbose: false,
        };
        let err = check_options(&options).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn sha256_matches_known_vector() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.bin");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn directories_are_rejected_as_podspecs() {
        let temp = TempDir::new().unwrap();
        let options = PackOptions {
            podspec: temp.path().to_string_lossy().into_owned(),
            artifact_repo_url: "https://example.com".to_string(),
            use_static_frameworks: false,
            generate_module_map: false,
            allow_warnings: false,
            repo_update: false,
            out_dir: PathBuf::from("."),
            skip_validation: true,
            skipped_platforms: Vec::new(),
            xcodebuild_opts: None,
            use_json: false,
            sources: Vec::new(),
            verbose: false,
        };
        let err = resolve_manifest(&options).unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn non_podspec_files_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "x").unwrap();
        let options = PackOptions {
            podspec: path.to_string_lossy().into_owned(),
            artifact_repo_url: "https://example.com".to_string(),
            use_static_frameworks: false,
            generate_module_map: false,
            allow_warnings: false,
            repo_update: false,
            out_dir: PathBuf::from("."),
            skip_validation: true,
            skipped_platforms: Vec::new(),
            xcodebuild_opts: None,
            use_json: false,
            sources: Vec::new(),
            verbose: false,
        };
        let err = resolve_manifest(&options).unwrap_err();
        assert!(err.to_string().contains("does not look like a podspec"));
    }
}
