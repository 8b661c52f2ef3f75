//! Binary manifest validation.
//!
//! Hands the generated podspec to the external linter and converts a
//! failed lint into a validation error carrying the reported reason.

use std::path::Path;

use crate::builder::run_command;
use crate::error::{Error, Result};

/// Lint a generated podspec with `pod spec lint`.
pub fn validate_manifest(
    spec_path: &Path,
    sources: &[String],
    allow_warnings: bool,
    use_static_frameworks: bool,
) -> Result<()> {
    let command = lint_command(spec_path, sources, allow_warnings, use_static_frameworks);
    match run_command(&command) {
        Ok(_) => Ok(()),
        Err(Error::Build { status, output, .. }) => Err(Error::Validation(format!(
            "pod spec lint exited with {status}: {}",
            last_lines(&output, 5)
        ))),
        Err(other) => Err(other),
    }
}

/// The lint command line for a spec path and run options.
pub fn lint_command(
    spec_path: &Path,
    sources: &[String],
    allow_warnings: bool,
    use_static_frameworks: bool,
) -> String {
    let mut command = format!("pod spec lint {} --fail-fast --no-subspecs", spec_path.display());
    if !sources.is_empty() {
        command.push_str(&format!(" --sources={}", sources.join(",")));
    }
    if allow_warnings {
        command.push_str(" --allow-warnings");
    }
    if use_static_frameworks {
        command.push_str(" --use-static-frameworks");
    }
    command
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn lint_command_includes_sources_and_flags() {
        let command = lint_command(
            &PathBuf::from("/staged/MyLib.podspec"),
            &["https://cdn.cocoapods.org/".to_string()],
            true,
            true,
        );
        assert_eq!(
            command,
            "pod spec lint /staged/MyLib.podspec --fail-fast --no-subspecs \
             --sources=https://cdn.cocoapods.org/ --allow-warnings --use-static-frameworks"
        );
    }

    #[test]
    fn lint_command_omits_optional_flags() {
        let command = lint_command(&PathBuf::from("X.podspec"), &[], false, false);
        assert_eq!(command, "pod spec lint X.podspec --fail-fast --no-subspecs");
    }

    #[test]
    fn failed_lint_becomes_a_validation_error() {
        // `pod` is unlikely to exist in CI; simulate with a failing stub.
        let err = match run_command("printf 'lint failure reason\\n'; exit 1") {
            Err(Error::Build { status, output, .. }) => Error::Validation(format!(
                "pod spec lint exited with {status}: {}",
                last_lines(&output, 5)
            )),
            other => panic!("expected build error, got {other:?}"),
        };
        assert!(err.to_string().contains("lint failure reason"));
    }
}
