//! Manifest deserialization and load-time validation.
//!
//! The JSON document is first read into permissive raw structs, then every
//! field is validated: versions must be semantic versions, each release needs
//! at least one artefact, a platform may appear only once per release and
//! every checksum must be a 64-character hex SHA-256 digest. Anything else is
//! rejected before the installer touches the network.

use super::error::{ManifestError, Result};
use super::release::{ArtifactEntry, Release, Tool, expand_version};
use super::sha256_digest::Sha256Digest;
use super::store::ManifestStore;
use crate::platform::{Arch, Os, Platform};
use camino::Utf8Path;
use log::debug;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_VERSION_FLAG: &str = "--version";
const DEFAULT_VERSION_OUTPUT: &str = "{version}";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: String,
    binary: Option<String>,
    homepage: Option<String>,
    version_flag: Option<String>,
    version_output: Option<String>,
    #[serde(default)]
    releases: Vec<RawRelease>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRelease {
    version: String,
    license: String,
    #[serde(alias = "desc")]
    description: String,
    homepage: Option<String>,
    #[serde(default)]
    artifacts: Vec<RawArtifact>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArtifact {
    os: Os,
    arch: Arch,
    url: String,
    sha256: String,
}

/// Parse a JSON manifest into a validated [`ManifestStore`].
///
/// # Errors
///
/// Returns [`ManifestError`] if the JSON is malformed or any release,
/// artefact or checksum fails validation.
///
/// # Examples
///
/// ```
/// use release_installer::manifest::parse_manifest;
///
/// let json = r#"{
///   "name": "stardust",
///   "releases": [{
///     "version": "0.1.0", "license": "MIT", "description": "docs",
///     "artifacts": [{ "os": "macos", "arch": "arm64",
///       "url": "https://example.test/v{version}/stardust-darwin-arm64.tar.gz",
///       "sha256": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" }]
///   }]
/// }"#;
/// let store = parse_manifest(json).expect("valid manifest");
/// assert_eq!(store.tool().binary(), "stardust");
/// assert_eq!(store.releases().count(), 1);
/// ```
pub fn parse_manifest(json: &str) -> Result<ManifestStore> {
    let raw: RawManifest = serde_json::from_str(json).map_err(|e| ManifestError::Parse {
        reason: e.to_string(),
    })?;
    build_store(raw)
}

/// Read and parse a manifest file.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] when the file cannot be read, otherwise
/// the same errors as [`parse_manifest`].
pub fn load_manifest(path: &Utf8Path) -> Result<ManifestStore> {
    debug!("loading manifest from {path}");
    let json = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    parse_manifest(&json)
}

fn build_store(raw: RawManifest) -> Result<ManifestStore> {
    let name = non_empty(raw.name, "name")?;
    let binary = match raw.binary {
        Some(binary) => non_empty(binary, "binary")?,
        None => name.clone(),
    };
    let tool = Tool {
        name,
        binary,
        homepage: raw.homepage,
        version_flag: raw
            .version_flag
            .unwrap_or_else(|| DEFAULT_VERSION_FLAG.to_owned()),
        version_output: raw
            .version_output
            .unwrap_or_else(|| DEFAULT_VERSION_OUTPUT.to_owned()),
    };

    let mut releases = BTreeMap::new();
    for raw_release in raw.releases {
        let release = build_release(raw_release)?;
        let version = release.version.clone();
        if releases.insert(version.clone(), release).is_some() {
            return Err(ManifestError::DuplicateRelease {
                version: version.to_string(),
            });
        }
    }

    debug!("manifest for {} holds {} release(s)", tool.name, releases.len());
    Ok(ManifestStore::new(tool, releases))
}

fn build_release(raw: RawRelease) -> Result<Release> {
    let version = parse_version(&raw.version)?;
    if raw.artifacts.is_empty() {
        return Err(ManifestError::EmptyRelease {
            version: version.to_string(),
        });
    }

    let mut artifacts = BTreeMap::new();
    for raw_artifact in raw.artifacts {
        let entry = build_artifact(&version, raw_artifact)?;
        let platform = entry.platform;
        if artifacts.insert(platform, entry).is_some() {
            return Err(ManifestError::DuplicateArtifact {
                version: version.to_string(),
                platform,
            });
        }
    }

    Ok(Release {
        version,
        license: raw.license,
        description: raw.description,
        homepage: raw.homepage,
        artifacts,
    })
}

fn build_artifact(version: &Version, raw: RawArtifact) -> Result<ArtifactEntry> {
    let platform = Platform::new(raw.os, raw.arch);
    let url = expand_version(raw.url.trim(), version);
    if url.is_empty() {
        return Err(ManifestError::EmptyUrl {
            version: version.to_string(),
            platform,
        });
    }
    let checksum =
        Sha256Digest::try_from(raw.sha256.trim()).map_err(|e| ManifestError::InvalidChecksum {
            version: version.to_string(),
            platform,
            reason: match e {
                ManifestError::InvalidSha256Digest { reason } => reason,
                other => other.to_string(),
            },
        })?;
    Ok(ArtifactEntry::new(platform, url, checksum))
}

/// Parse a version string, accepting an optional leading `v`.
pub(crate) fn parse_version(value: &str) -> Result<Version> {
    let trimmed = value.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|e| ManifestError::InvalidVersion {
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

fn non_empty(value: String, field: &'static str) -> Result<String> {
    if value.trim().is_empty() {
        Err(ManifestError::EmptyField { field })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
