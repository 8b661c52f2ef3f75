//! Apple platform and build-variant model.
//!
//! Platforms form a closed set. Whether a platform splits its build into
//! device and simulator variants is table-driven rather than scattered
//! through dispatch sites, so adding a platform means touching one table.

use crate::error::{Error, Result};

/// The closed set of supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Ios,
    Osx,
    Watchos,
    Tvos,
}

/// One half of a device/simulator split build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildVariant {
    Simulator,
    Device,
}

impl BuildVariant {
    /// Suffix appended to the archive name, e.g. `Target-simulator.xcarchive`.
    pub fn archive_suffix(self) -> &'static str {
        match self {
            Self::Simulator => "simulator",
            Self::Device => "device",
        }
    }
}

/// Per-platform build shape: (platform, has device/simulator split).
const VARIANT_TABLE: &[(Platform, bool)] = &[
    (Platform::Ios, true),
    (Platform::Osx, false),
    (Platform::Watchos, true),
    (Platform::Tvos, true),
];

impl Platform {
    /// All platforms, in manifest declaration order.
    pub const ALL: &'static [Platform] =
        &[Platform::Ios, Platform::Osx, Platform::Watchos, Platform::Tvos];

    /// Parse a podspec platform key (`ios`, `osx`, `watchos`, `tvos`).
    ///
    /// `macos` is accepted as an alias for `osx`.
    pub fn from_key(key: &str) -> Result<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "osx" | "macos" => Ok(Self::Osx),
            "watchos" => Ok(Self::Watchos),
            "tvos" => Ok(Self::Tvos),
            other => Err(Error::Configuration(format!("unknown platform: '{other}'"))),
        }
    }

    /// The podspec attribute key for this platform.
    pub fn key(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Osx => "osx",
            Self::Watchos => "watchos",
            Self::Tvos => "tvos",
        }
    }

    /// Human-readable name as it appears in destination descriptors.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Osx => "macOS",
            Self::Watchos => "watchOS",
            Self::Tvos => "tvOS",
        }
    }

    pub fn has_device_simulator_split(self) -> bool {
        VARIANT_TABLE
            .iter()
            .find(|(platform, _)| *platform == self)
            .map(|(_, split)| *split)
            .unwrap_or(false)
    }

    /// Build variants for this platform, simulator first.
    ///
    /// A platform without a split produces a single unvaried build,
    /// represented as `[None]`.
    pub fn variants(self) -> Vec<Option<BuildVariant>> {
        if self.has_device_simulator_split() {
            vec![Some(BuildVariant::Simulator), Some(BuildVariant::Device)]
        } else {
            vec![None]
        }
    }

    /// The variant whose build settings describe this platform's products.
    pub fn settings_variant(self) -> Option<BuildVariant> {
        if self.has_device_simulator_split() {
            Some(BuildVariant::Simulator)
        } else {
            None
        }
    }

    /// The xcodebuild `-destination` descriptor for a variant of this platform.
    pub fn destination(self, variant: Option<BuildVariant>) -> Result<String> {
        match (self.has_device_simulator_split(), variant) {
            (true, Some(BuildVariant::Simulator)) => {
                Ok(format!("generic/platform={} Simulator", self.display_name()))
            }
            (true, Some(BuildVariant::Device)) | (false, None) => {
                Ok(format!("generic/platform={}", self.display_name()))
            }
            _ => Err(Error::Configuration(format!(
                "unknown variant {:?} for platform '{}'",
                variant,
                self.display_name()
            ))),
        }
    }

    /// Whether a `--skip-platforms` token names this platform.
    ///
    /// Tokens are matched case-insensitively with whitespace stripped, so
    /// `iOS`, `ios` and ` i o s ` all match.
    pub fn matches_skip_token(self, token: &str) -> bool {
        let normalized: String = token
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        normalized == self.key() || (self == Self::Osx && normalized == "macos")
    }
}

/// A platform declared by a manifest, with its deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub platform: Platform,
    pub deployment_target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_key_accepts_known_platforms() {
        assert_eq!(Platform::from_key("ios").unwrap(), Platform::Ios);
        assert_eq!(Platform::from_key("macos").unwrap(), Platform::Osx);
        assert_eq!(Platform::from_key(" tvOS ").unwrap(), Platform::Tvos);
    }

    #[test]
    fn from_key_rejects_unknown_platform() {
        let err = Platform::from_key("freebsd").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("freebsd"));
    }

    #[test]
    fn split_platforms_build_simulator_then_device() {
        assert_eq!(
            Platform::Ios.variants(),
            vec![Some(BuildVariant::Simulator), Some(BuildVariant::Device)]
        );
        assert_eq!(Platform::Osx.variants(), vec![None]);
    }

    #[test]
    fn destinations_match_xcodebuild_descriptors() {
        assert_eq!(
            Platform::Ios
                .destination(Some(BuildVariant::Simulator))
                .unwrap(),
            "generic/platform=iOS Simulator"
        );
        assert_eq!(
            Platform::Ios.destination(Some(BuildVariant::Device)).unwrap(),
            "generic/platform=iOS"
        );
        assert_eq!(Platform::Osx.destination(None).unwrap(), "generic/platform=macOS");
    }

    #[test]
    fn destination_rejects_variant_mismatch() {
        assert!(Platform::Osx.destination(Some(BuildVariant::Device)).is_err());
        assert!(Platform::Ios.destination(None).is_err());
    }

    #[test]
    fn skip_tokens_ignore_case_and_whitespace() {
        assert!(Platform::Ios.matches_skip_token("iOS"));
        assert!(Platform::Osx.matches_skip_token(" mac OS "));
        assert!(Platform::Osx.matches_skip_token("osx"));
        assert!(!Platform::Tvos.matches_skip_token("watchos"));
    }
}
