//! Read-only table of releases keyed by `(version, os, arch)`.

use super::error::LookupError;
use super::parser::parse_version;
use super::release::{ArtifactEntry, Release, Tool};
use crate::platform::Platform;
use semver::Version;
use std::collections::BTreeMap;

/// An append-only log of immutable releases for one tool.
///
/// Built once per process by [`parse_manifest`](super::parse_manifest) or
/// [`load_manifest`](super::load_manifest) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestStore {
    tool: Tool,
    releases: BTreeMap<Version, Release>,
}

impl ManifestStore {
    pub(crate) fn new(tool: Tool, releases: BTreeMap<Version, Release>) -> Self {
        Self { tool, releases }
    }

    /// Return the tool metadata shared by all releases.
    #[must_use]
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Iterate over releases from oldest to newest.
    pub fn releases(&self) -> impl Iterator<Item = &Release> {
        self.releases.values()
    }

    /// Return the release with the highest version.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NoReleases`] for an empty manifest.
    pub fn latest(&self) -> Result<&Release, LookupError> {
        self.releases
            .values()
            .next_back()
            .ok_or(LookupError::NoReleases)
    }

    /// Find a release by version string (a leading `v` is accepted).
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownVersion`] when the string is not a
    /// version or no release carries it.
    pub fn release(&self, version: &str) -> Result<&Release, LookupError> {
        let unknown = || LookupError::UnknownVersion {
            version: version.to_owned(),
        };
        let parsed = parse_version(version).map_err(|_| unknown())?;
        self.releases.get(&parsed).ok_or_else(unknown)
    }

    /// Resolve an optional version request, defaulting to the latest release.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the version is unknown or the manifest is
    /// empty.
    pub fn resolve(&self, version: Option<&str>) -> Result<&Release, LookupError> {
        match version {
            Some(requested) => self.release(requested),
            None => self.latest(),
        }
    }

    /// Look up the single artefact for `(version, platform)`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownVersion`] or [`LookupError::NoArtifact`]
    /// when no entry matches.
    pub fn lookup(&self, version: &str, platform: Platform) -> Result<&ArtifactEntry, LookupError> {
        let release = self.release(version)?;
        release
            .artifact(platform)
            .ok_or_else(|| LookupError::NoArtifact {
                version: release.version.to_string(),
                platform,
            })
    }

    /// Return the platforms supported by `version`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownVersion`] for an unpublished version.
    pub fn platforms(&self, version: &str) -> Result<Vec<Platform>, LookupError> {
        Ok(self.release(version)?.platforms())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
