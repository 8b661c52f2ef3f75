//! Binary manifest generation.
//!
//! Accumulates (platform, artifact file name) pairs over a pipeline run
//! and produces the rewritten manifest in two serializations: podspec JSON
//! and Ruby DSL text. The source manifest is never mutated; the binary
//! form is a derived copy whose `source` points at the zipped artifact and
//! whose per-platform `vendored_frameworks` name the staged xcframeworks.

use std::path::Path;

use serde_json::{Map, Value};

use crate::manifest::PackageManifest;
use crate::platform::Platform;

/// Attributes that only make sense for a source build.
const SOURCE_ONLY_ATTRIBUTES: &[&str] = &[
    "source_files",
    "public_header_files",
    "private_header_files",
    "header_mappings_dir",
    "header_dir",
    "module_map",
    "prepare_command",
    "artifact_repo_url",
];

/// Builds the rewritten binary manifest.
pub struct SpecGenerator<'a> {
    manifest: &'a PackageManifest,
    artifact_repo_url: &'a str,
    zip_file_name: String,
    staged_sources: bool,
    platform_artifacts: Vec<(Platform, String)>,
}

impl<'a> SpecGenerator<'a> {
    pub fn new(
        manifest: &'a PackageManifest,
        artifact_repo_url: &'a str,
        zip_output_path: &Path,
        staged_sources: bool,
    ) -> Self {
        let zip_file_name = zip_output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.zip", manifest.name()));
        Self {
            manifest,
            artifact_repo_url,
            zip_file_name,
            staged_sources,
            platform_artifacts: Vec::new(),
        }
    }

    /// Record the staged artifact file name for one platform.
    pub fn add_platform(&mut self, platform: Platform, artifact_file_name: &str) {
        self.platform_artifacts
            .push((platform, artifact_file_name.to_string()));
    }

    /// The rewritten attribute bag.
    pub fn generate(&self) -> Map<String, Value> {
        let mut attributes = self.manifest.attributes().clone();
        for attribute in SOURCE_ONLY_ATTRIBUTES {
            attributes.remove(*attribute);
        }

        let mut source = Map::new();
        source.insert(
            "http".to_string(),
            Value::String(join_url(self.artifact_repo_url, &self.zip_file_name)),
        );
        attributes.insert("source".to_string(), Value::Object(source));

        if self.staged_sources {
            for (platform, artifact) in &self.platform_artifacts {
                let entry = attributes
                    .entry(platform.key().to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = entry {
                    map.insert(
                        "vendored_frameworks".to_string(),
                        Value::String(format!("{}/{artifact}", platform.key())),
                    );
                }
            }
        }
        attributes
    }

    /// The structured-data serialization (`<name>.podspec.json`).
    pub fn generate_json(&self) -> String {
        let mut text = serde_json::to_string_pretty(&Value::Object(self.generate()))
            .unwrap_or_else(|_| "{}".to_string());
        text.push('\n');
        text
    }

    /// The native-DSL serialization (`<name>.podspec`).
    pub fn generate_ruby(&self) -> String {
        let attributes = self.generate();
        let mut out = String::from("Pod::Spec.new do |s|\n");
        // Name and version lead; the rest follow in stable key order.
        for key in ["name", "version"] {
            if let Some(value) = attributes.get(key) {
                out.push_str(&format!("  s.{key} = {}\n", ruby_literal(value)));
            }
        }
        for (key, value) in &attributes {
            if key == "name" || key == "version" {
                continue;
            }
            render_attribute(key, value, &mut out);
        }
        out.push_str("end\n");
        out
    }
}

/// Platform sub-hashes and the `platforms` attribute render as accessor
/// chains (`s.ios.vendored_frameworks = ...`); everything else is a plain
/// assignment.
fn render_attribute(key: &str, value: &Value, out: &mut String) {
    if key == "platforms" {
        if let Value::Object(platforms) = value {
            for (platform, target) in platforms {
                match target {
                    Value::String(version) => out.push_str(&format!(
                        "  s.{platform}.deployment_target = '{}'\n",
                        escape_ruby(version)
                    )),
                    Value::Null => {}
                    other => out.push_str(&format!(
                        "  s.{platform}.deployment_target = {}\n",
                        ruby_literal(other)
                    )),
                }
            }
        }
        return;
    }
    if Platform::from_key(key).is_ok() {
        if let Value::Object(sub) = value {
            for (sub_key, sub_value) in sub {
                out.push_str(&format!(
                    "  s.{key}.{sub_key} = {}\n",
                    ruby_literal(sub_value)
                ));
            }
            return;
        }
    }
    out.push_str(&format!("  s.{key} = {}\n", ruby_literal(value)));
}

fn ruby_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", escape_ruby(s)),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(ruby_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{}' => {}", escape_ruby(k), ruby_literal(v)))
                .collect();
            format!("{{ {} }}", rendered.join(", "))
        }
    }
}

fn escape_ruby(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

fn join_url(base: &str, file_name: &str) -> String {
    format!("{}/{file_name}", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn manifest() -> PackageManifest {
        PackageManifest::from_json_str(
            r#"{
                "name": "MyLib",
                "version": "1.2.3",
                "platforms": {"ios": "12.0"},
                "source": {"git": "https://example.com/mylib.git", "tag": "1.2.3"},
                "source_files": "Sources/**/*.swift",
                "artifact_repo_url": "https://artifacts.example.com/pods"
            }"#,
            PathBuf::from("/pods/MyLib/MyLib.podspec.json"),
        )
        .unwrap()
    }

    fn generator(manifest: &PackageManifest) -> SpecGenerator<'_> {
        let mut generator = SpecGenerator::new(
            manifest,
            "https://artifacts.example.com/pods/",
            Path::new("/out/zips/MyLib/1.2.3/MyLib.zip"),
            true,
        );
        generator.add_platform(Platform::Ios, "MyLib.xcframework");
        generator
    }

    #[test]
    fn source_points_at_the_zipped_artifact() {
        let manifest = manifest();
        let attributes = generator(&manifest).generate();
        assert_eq!(
            attributes["source"]["http"],
            Value::String("https://artifacts.example.com/pods/MyLib.zip".to_string())
        );
    }

    #[test]
    fn source_build_attributes_are_stripped() {
        let manifest = manifest();
        let attributes = generator(&manifest).generate();
        assert!(!attributes.contains_key("source_files"));
        assert!(!attributes.contains_key("artifact_repo_url"));
    }

    #[test]
    fn platforms_gain_vendored_framework_entries() {
        let manifest = manifest();
        let attributes = generator(&manifest).generate();
        assert_eq!(
            attributes["ios"]["vendored_frameworks"],
            Value::String("ios/MyLib.xcframework".to_string())
        );
    }

    #[test]
    fn no_vendored_entries_without_staged_sources() {
        let manifest = manifest();
        let mut generator = SpecGenerator::new(
            &manifest,
            "https://artifacts.example.com/pods",
            Path::new("/out/MyLib.zip"),
            false,
        );
        generator.add_platform(Platform::Ios, "MyLib.xcframework");
        assert!(!generator.generate().contains_key("ios"));
    }

    #[test]
    fn ruby_form_is_a_spec_block() {
        let manifest = manifest();
        let ruby = generator(&manifest).generate_ruby();
        assert!(ruby.starts_with("Pod::Spec.new do |s|\n  s.name = 'MyLib'\n"));
        assert!(ruby.contains("  s.version = '1.2.3'\n"));
        assert!(ruby.contains("  s.ios.deployment_target = '12.0'\n"));
        assert!(ruby.contains("  s.ios.vendored_frameworks = 'ios/MyLib.xcframework'\n"));
        assert!(ruby.contains(
            "  s.source = { 'http' => 'https://artifacts.example.com/pods/MyLib.zip' }\n"
        ));
        assert!(ruby.ends_with("end\n"));
    }

    #[test]
    fn json_form_round_trips() {
        let manifest = manifest();
        let json = generator(&manifest).generate_json();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["name"], Value::String("MyLib".to_string()));
    }
}
