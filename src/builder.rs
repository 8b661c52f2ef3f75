//! xcodebuild invocation adapter.
//!
//! Command construction is a pure function of (target, platform, variant,
//! extra args, global options): the same inputs always produce the same
//! command string, and the strings are what the tests pin down. Execution
//! is a blocking shell invocation; a non-zero exit surfaces the captured
//! output and aborts the run. No retries.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::platform::{BuildVariant, Platform};

/// Adapter around the external `xcodebuild` toolchain.
pub struct XcodeBuilder<'a> {
    project_path: &'a Path,
    xcodebuild_opts: Option<&'a str>,
    out_dir: &'a Path,
    verbose: bool,
}

impl<'a> XcodeBuilder<'a> {
    pub fn new(
        project_path: &'a Path,
        xcodebuild_opts: Option<&'a str>,
        out_dir: &'a Path,
        verbose: bool,
    ) -> Self {
        Self {
            project_path,
            xcodebuild_opts,
            out_dir,
            verbose,
        }
    }

    /// Build every variant of `target` for `platform`, one blocking
    /// archive invocation per variant, simulator first.
    pub fn build(&self, platform: Platform, target: &str, extra_args: Option<&str>) -> Result<()> {
        println!(
            "[pack:{}] building {} for {}...",
            platform.key(),
            target,
            platform.display_name()
        );
        for command in self.archive_commands(platform, target, extra_args)? {
            self.run(&command)?;
        }
        println!("[pack:{}] {} build successful", platform.key(), platform.display_name());
        Ok(())
    }

    /// The archive command strings `build` will execute, in order.
    pub fn archive_commands(
        &self,
        platform: Platform,
        target: &str,
        extra_args: Option<&str>,
    ) -> Result<Vec<String>> {
        platform
            .variants()
            .into_iter()
            .map(|variant| {
                let mut command = self.base_command(platform, target, variant, extra_args)?;
                let suffix = variant
                    .map(|v| format!("-{}", v.archive_suffix()))
                    .unwrap_or_default();
                command.push_str(&format!(
                    " archive -archivePath {}/{target}{suffix}.xcarchive",
                    self.out_dir.display()
                ));
                Ok(command)
            })
            .collect()
    }

    /// Query build settings for one (platform, variant) of `target`.
    ///
    /// The settings query substitutes `-showBuildSettings` for the archive
    /// action of the equivalent build command.
    pub fn build_settings(
        &self,
        platform: Platform,
        target: &str,
        variant: Option<BuildVariant>,
    ) -> Result<BTreeMap<String, String>> {
        let command = self.settings_command(platform, target, variant)?;
        let output = self.run(&command)?;
        Ok(parse_build_settings(&output))
    }

    /// The settings-query command string for one (platform, variant).
    pub fn settings_command(
        &self,
        platform: Platform,
        target: &str,
        variant: Option<BuildVariant>,
    ) -> Result<String> {
        let mut command = self.base_command(platform, target, variant, None)?;
        command.push_str(" -showBuildSettings");
        Ok(command)
    }

    fn base_command(
        &self,
        platform: Platform,
        target: &str,
        variant: Option<BuildVariant>,
        extra_args: Option<&str>,
    ) -> Result<String> {
        let mut command = format!(
            "xcodebuild ONLY_ACTIVE_ARCH=NO SKIP_INSTALL=NO BUILD_LIBRARY_FOR_DISTRIBUTION=YES \
             -project {} -scheme \"{target}\" -configuration Release \
             EXCLUDED_SOURCE_FILE_NAMES=*-dummy.m -destination \"{}\"",
            self.project_path.display(),
            platform.destination(variant)?
        );
        for args in [extra_args, self.xcodebuild_opts] {
            if let Some(args) = args.map(str::trim).filter(|a| !a.is_empty()) {
                command.push(' ');
                command.push_str(args);
            }
        }
        Ok(command)
    }

    fn run(&self, command: &str) -> Result<String> {
        if self.verbose {
            println!("{command}");
        }
        let output = run_command(command)?;
        if self.verbose {
            println!("{output}");
        }
        Ok(output)
    }
}

/// Run a command line through the shell, blocking until it exits.
///
/// Returns the combined stdout+stderr on success. On a non-zero exit the
/// combined output is surfaced on stderr and carried in the error together
/// with the exact exit status.
pub(crate) fn run_command(command: &str) -> Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|e| Error::io(PathBuf::from("sh"), e))?;
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    if output.status.success() {
        return Ok(combined);
    }
    eprintln!("{}", combined.trim_end());
    Err(Error::Build {
        command: command.to_string(),
        status: output.status,
        output: combined,
    })
}

/// Parse `KEY = VALUE` settings lines into a map.
///
/// Both sides are trimmed; entries whose value is empty after trimming are
/// dropped, as are lines without a `=`.
pub fn parse_build_settings(text: &str) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        settings.insert(key.to_string(), value.to_string());
    }
    settings
}

/// The full tuple identifying one settings query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingsKey {
    pub sandbox_root: PathBuf,
    pub out_dir: PathBuf,
    pub platform: Platform,
    pub target: String,
    pub variant: Option<BuildVariant>,
}

/// Process-local memoization of settings queries.
///
/// At most one external invocation happens per distinct key tuple for the
/// lifetime of a pipeline run; a hit performs none.
#[derive(Debug, Default)]
pub struct SettingsCache {
    entries: HashMap<SettingsKey, BTreeMap<String, String>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, invoking `fetch` only on a miss.
    pub fn get_or_fetch<F>(&mut self, key: SettingsKey, fetch: F) -> Result<&BTreeMap<String, String>>
    where
        F: FnOnce() -> Result<BTreeMap<String, String>>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(fetch()?)),
        }
    }
}
