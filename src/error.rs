//! Error taxonomy for the pack pipeline.
//!
//! Every external-process and filesystem-safety failure carries enough
//! context to diagnose the run without re-running it: the command line or
//! path involved, the exit status, and the captured output. Nothing here is
//! retried; callers abort on the first error.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Failures raised by the pack pipeline and its components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or contradictory input detected before any process runs.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Remote manifest retrieval failed.
    #[error("downloading podspec from '{url}' failed: {reason}")]
    Fetch { url: String, reason: String },

    /// An xcodebuild invocation exited non-zero.
    #[error("failed to execute '{command}'. Exit status: {status}")]
    Build {
        command: String,
        status: ExitStatus,
        output: String,
    },

    /// The create-xcframework packaging tool exited non-zero.
    #[error("failed to invoke create-xcframework command! Exit status: {status}")]
    Packaging {
        command: String,
        status: ExitStatus,
        output: String,
    },

    /// A staged file's destination would escape the staging root.
    #[error("bad relative path '{}': escapes the staging root", path.display())]
    PathEscape { path: PathBuf },

    /// A staged file's destination already exists.
    #[error("file '{}' already exists", path.display())]
    Collision { path: PathBuf },

    /// A symbolic link resolves to one of its own ancestors.
    #[error("cannot handle recursive links: {} => {}", link.display(), ancestor.display())]
    Cycle { link: PathBuf, ancestor: PathBuf },

    /// The generated binary manifest failed lint.
    #[error("the binary spec did not pass validation: {0}")]
    Validation(String),

    /// Filesystem access failed at a known path.
    #[error("i/o failure at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
