//! Build, stage and package pipeline for binary pod distributions.
//!
//! Takes a source podspec, builds its frameworks for every declared Apple
//! platform, bundles them into xcframeworks, stages the pod's non-compiled
//! assets next to them, zips the result and emits a rewritten binary
//! podspec pointing at the uploaded zip.
//!
//! # Pipeline
//!
//! ```text
//! podspec (path or URL)
//!     │
//!     ├── per platform: pod install ── xcodebuild archive ── xcframework
//!     ├── stage shared assets (vendored libs, resources, license)
//!     ├── zip staged tree (+ sha256 checksum)
//!     ├── generate binary podspec (Ruby DSL or JSON)
//!     └── pod spec lint (optional)
//! ```
//!
//! The [`pipeline`] module is the entry point; everything else is a
//! component it composes.

pub mod archive;
pub mod builder;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod modulemap;
pub mod pipeline;
pub mod platform;
pub mod preflight;
pub mod sandbox;
pub mod specgen;
pub mod stage;
pub mod validate;
pub mod walker;
pub mod zipgen;

pub use error::{Error, Result};
pub use pipeline::{run, PackOptions};
