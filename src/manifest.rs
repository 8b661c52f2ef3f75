//! Package manifest (podspec) model.
//!
//! Manifests are consumed in their structured JSON form. The attribute bag
//! is kept as parsed JSON rather than a rigid struct: the pipeline only
//! interprets the attributes it stages or builds from, and the rewritten
//! binary manifest must round-trip every attribute it does not touch.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformTarget};

/// A loaded podspec: the attribute bag plus the file it was defined in.
///
/// Read-only after loading; the binary form produced at the end of a run is
/// a separate value (see [`crate::specgen::SpecGenerator`]).
#[derive(Debug, Clone)]
pub struct PackageManifest {
    attributes: Map<String, Value>,
    defined_in: PathBuf,
}

impl PackageManifest {
    /// Load a manifest from a `.podspec.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text, path.to_path_buf())
    }

    /// Parse manifest text, recording where it was defined.
    pub fn from_json_str(text: &str, defined_in: PathBuf) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::Configuration(format!(
                "podspec '{}' is not valid JSON: {e}",
                defined_in.display()
            ))
        })?;
        let Value::Object(attributes) = value else {
            return Err(Error::Configuration(format!(
                "podspec '{}' must be a JSON object",
                defined_in.display()
            )));
        };
        let manifest = Self {
            attributes,
            defined_in,
        };
        for required in ["name", "version"] {
            if manifest.string_attr(required).is_none() {
                return Err(Error::Configuration(format!(
                    "podspec '{}' is missing '{required}'",
                    manifest.defined_in.display()
                )));
            }
        }
        Ok(manifest)
    }

    pub fn name(&self) -> &str {
        self.string_attr("name").unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.string_attr("version").unwrap_or_default()
    }

    /// The compiler-visible module name: the `module_name` attribute if
    /// present, otherwise the pod name mangled into a C99 identifier.
    pub fn module_name(&self) -> String {
        self.string_attr("module_name")
            .map(str::to_string)
            .unwrap_or_else(|| c99_identifier(self.name()))
    }

    pub fn defined_in(&self) -> &Path {
        &self.defined_in
    }

    /// Re-point the manifest at a relocated definition file (remote-source
    /// fixup copies the podspec next to the downloaded source).
    pub fn set_defined_in(&mut self, path: PathBuf) {
        self.defined_in = path;
    }

    /// The directory the manifest's relative globs resolve against.
    pub fn source_root(&self) -> PathBuf {
        self.defined_in
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Platforms declared by the manifest, in closed-set order.
    ///
    /// A manifest with no `platforms` attribute supports every platform.
    pub fn available_platforms(&self) -> Vec<PlatformTarget> {
        let declared = self.attributes.get("platforms").and_then(Value::as_object);
        Platform::ALL
            .iter()
            .filter_map(|&platform| match declared {
                None => Some(PlatformTarget {
                    platform,
                    deployment_target: None,
                }),
                Some(map) => map.get(platform.key()).map(|target| PlatformTarget {
                    platform,
                    deployment_target: target.as_str().map(str::to_string),
                }),
            })
            .collect()
    }

    /// Globs for a vendored-artifact attribute, including every
    /// per-platform override, deduplicated.
    pub fn vendored_globs(&self, attribute: &str) -> BTreeSet<String> {
        let mut globs: BTreeSet<String> = string_list(self.attributes.get(attribute))
            .into_iter()
            .collect();
        for platform in Platform::ALL {
            let sub = self
                .attributes
                .get(platform.key())
                .and_then(Value::as_object)
                .and_then(|map| map.get(attribute));
            globs.extend(string_list(sub));
        }
        globs
    }

    /// Globs for a plain attribute (`resources`, `preserve_paths`, ...).
    pub fn attribute_globs(&self, attribute: &str) -> BTreeSet<String> {
        string_list(self.attributes.get(attribute)).into_iter().collect()
    }

    /// All resource-bundle globs, across every declared bundle.
    pub fn resource_bundle_globs(&self) -> Vec<String> {
        let Some(bundles) = self.attributes.get("resource_bundles").and_then(Value::as_object)
        else {
            return Vec::new();
        };
        bundles.values().flat_map(|spec| string_list(Some(spec))).collect()
    }

    /// Inline license text, if the manifest embeds one.
    pub fn license_text(&self) -> Option<&str> {
        self.attributes
            .get("license")
            .and_then(Value::as_object)?
            .get("text")
            .and_then(Value::as_str)
    }

    /// Explicit license file path, relative to the source root.
    pub fn license_file(&self) -> Option<&str> {
        self.attributes
            .get("license")
            .and_then(Value::as_object)?
            .get("file")
            .and_then(Value::as_str)
    }

    pub fn header_mappings_dir(&self) -> Option<&str> {
        self.string_attr("header_mappings_dir")
    }

    /// Globs that select the pod's public headers.
    ///
    /// Falls back to `source_files` when `public_header_files` is absent,
    /// mirroring how a sandbox file accessor resolves them.
    pub fn public_header_globs(&self) -> Vec<String> {
        let explicit = string_list(self.attributes.get("public_header_files"));
        if !explicit.is_empty() {
            return explicit;
        }
        string_list(self.attributes.get("source_files"))
    }

    /// The `source` attribute (git/tag/http descriptor).
    pub fn source(&self) -> Option<&Map<String, Value>> {
        self.attributes.get("source").and_then(Value::as_object)
    }

    fn string_attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Flatten a string-or-array attribute value into a list of strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Mangle a pod name into a valid C99 extended identifier.
fn c99_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
