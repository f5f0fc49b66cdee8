//! Release and artefact records.
//!
//! Records are immutable once loaded: fields are private and exposed through
//! accessors, and nothing in the crate mutates a loaded release.

use super::sha256_digest::Sha256Digest;
use crate::platform::{Arch, Os, Platform};
use semver::Version;
use serde::Serialize;
use std::collections::BTreeMap;

/// Placeholder expanded with the release version inside URLs and version
/// output templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Metadata shared by every release of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub(crate) name: String,
    pub(crate) binary: String,
    pub(crate) homepage: Option<String>,
    pub(crate) version_flag: String,
    pub(crate) version_output: String,
}

impl Tool {
    /// Return the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the executable name inside each archive and on disk.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Return the project homepage, when declared.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Return the flag that makes the binary print its version.
    #[must_use]
    pub fn version_flag(&self) -> &str {
        &self.version_flag
    }

    /// Render the string the version query must print for `version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_installer::manifest::parse_manifest;
    ///
    /// let json = r#"{
    ///   "name": "stardust", "binary": "stardust",
    ///   "version_output": "Stardust v{version}",
    ///   "releases": [{
    ///     "version": "0.4.0", "license": "MIT", "description": "docs",
    ///     "artifacts": [{ "os": "linux", "arch": "x64",
    ///       "url": "https://example.test/stardust.tar.gz",
    ///       "sha256": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" }]
    ///   }]
    /// }"#;
    /// let store = parse_manifest(json).expect("valid manifest");
    /// let version = semver::Version::new(0, 4, 0);
    /// assert_eq!(store.tool().expected_version_output(&version), "Stardust v0.4.0");
    /// ```
    #[must_use]
    pub fn expected_version_output(&self, version: &Version) -> String {
        expand_version(&self.version_output, version)
    }
}

/// A published release: version, licence, description and artefacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub(crate) version: Version,
    pub(crate) license: String,
    pub(crate) description: String,
    pub(crate) homepage: Option<String>,
    pub(crate) artifacts: BTreeMap<Platform, ArtifactEntry>,
}

impl Release {
    /// Return the semantic version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Return the licence identifier.
    #[must_use]
    pub fn license(&self) -> &str {
        &self.license
    }

    /// Return the one-line description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Return the release-specific homepage override, when declared.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Return the artefact for `platform`, if this release ships one.
    #[must_use]
    pub fn artifact(&self, platform: Platform) -> Option<&ArtifactEntry> {
        self.artifacts.get(&platform)
    }

    /// Iterate over all artefacts in platform order.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.artifacts.values()
    }

    /// Return the platforms this release supports, in a stable order.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.artifacts.keys().copied().collect()
    }
}

/// One downloadable artefact: where to get it and what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub(crate) platform: Platform,
    pub(crate) url: String,
    #[serde(rename = "sha256")]
    pub(crate) checksum: Sha256Digest,
}

impl ArtifactEntry {
    /// Construct an entry directly, bypassing manifest parsing.
    #[must_use]
    pub fn new(platform: Platform, url: impl Into<String>, checksum: Sha256Digest) -> Self {
        Self {
            platform,
            url: url.into(),
            checksum,
        }
    }

    /// Return the platform this artefact targets.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Return the operating system this artefact targets.
    #[must_use]
    pub fn os(&self) -> Os {
        self.platform.os
    }

    /// Return the architecture this artefact targets.
    #[must_use]
    pub fn arch(&self) -> Arch {
        self.platform.arch
    }

    /// Return the download URL with `{version}` already expanded.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the expected SHA-256 digest of the downloaded bytes.
    #[must_use]
    pub fn checksum(&self) -> &Sha256Digest {
        &self.checksum
    }
}

/// Replace every `{version}` in `template` with `version`.
pub(crate) fn expand_version(template: &str, version: &Version) -> String {
    template.replace(VERSION_PLACEHOLDER, &version.to_string())
}
