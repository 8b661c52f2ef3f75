//! Host tool checks run before any real work starts.

use crate::error::{Error, Result};

/// External commands the pipeline shells out to.
const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("xcodebuild", "Xcode command line tools"),
    ("pod", "CocoaPods"),
];

pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Verify every required external tool resolves on PATH.
pub fn check_host_tools() -> Result<()> {
    let missing: Vec<String> = REQUIRED_TOOLS
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .map(|(tool, provided_by)| format!("{tool} (from {provided_by})"))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::Configuration(format!(
        "missing required tools: {}",
        missing.join(", ")
    )))
}
