//! Output formatting for release listing.
//!
//! This module provides utilities to format the releases in a manifest for
//! human-readable or JSON output.

use crate::manifest::{ArtifactEntry, ManifestStore};
use crate::platform::Platform;
use serde::Serialize;

/// Format the releases in `store` for human-readable output.
///
/// Releases are listed newest first; `host` marks the platform this machine
/// would install.
///
/// # Examples
///
/// ```
/// use release_installer::list_output::format_human;
/// use release_installer::manifest::parse_manifest;
///
/// let store = parse_manifest(r#"{"name": "stardust", "releases": []}"#).expect("valid");
/// let output = format_human(&store, None);
/// assert!(output.contains("No releases"));
/// ```
#[must_use]
pub fn format_human(store: &ManifestStore, host: Option<Platform>) -> String {
    let tool = store.tool();
    let mut releases: Vec<_> = store.releases().collect();
    if releases.is_empty() {
        return format!("No releases of {} in manifest.", tool.name());
    }
    releases.reverse();

    let mut output = format!("Releases of {}:\n", tool.name());
    if let Some(homepage) = tool.homepage() {
        output.push_str(&format!("Homepage: {homepage}\n"));
    }

    for (index, release) in releases.iter().enumerate() {
        let latest_marker = if index == 0 { " (latest)" } else { "" };
        output.push('\n');
        output.push_str(&format!(
            "{}{latest_marker} - {} - {}\n",
            release.version(),
            release.license(),
            release.description()
        ));
        for entry in release.artifacts() {
            let host_marker = host
                .filter(|platform| *platform == entry.platform())
                .map_or("", |_| " (this machine)");
            output.push_str(&format!("  {}{host_marker}\n", entry.platform()));
        }
    }

    output
}

/// Format the releases in `store` as JSON.
///
/// # Examples
///
/// ```
/// use release_installer::list_output::format_json;
/// use release_installer::manifest::parse_manifest;
///
/// let store = parse_manifest(r#"{"name": "stardust", "releases": []}"#).expect("valid");
/// let json = format_json(&store);
/// assert!(json.contains("\"releases\""));
/// ```
#[must_use]
pub fn format_json(store: &ManifestStore) -> String {
    let json_data = ReleasesJson::from_store(store);

    // Use pretty printing for readability
    serde_json::to_string_pretty(&json_data).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serializable representation of a manifest.
#[derive(Debug, Serialize)]
pub struct ReleasesJson<'a> {
    /// Tool name.
    pub name: &'a str,
    /// Installed binary name.
    pub binary: &'a str,
    /// Latest version, if any.
    pub latest: Option<String>,
    /// Releases from oldest to newest.
    pub releases: Vec<ReleaseEntry<'a>>,
}

impl<'a> ReleasesJson<'a> {
    fn from_store(store: &'a ManifestStore) -> Self {
        let tool = store.tool();
        Self {
            name: tool.name(),
            binary: tool.binary(),
            latest: store.latest().ok().map(|release| release.version().to_string()),
            releases: store
                .releases()
                .map(|release| ReleaseEntry {
                    version: release.version().to_string(),
                    license: release.license(),
                    description: release.description(),
                    artifacts: release.artifacts().collect(),
                })
                .collect(),
        }
    }
}

/// JSON entry for a release.
#[derive(Debug, Serialize)]
pub struct ReleaseEntry<'a> {
    /// Semantic version.
    pub version: String,
    /// License identifier.
    pub license: &'a str,
    /// One-line description.
    pub description: &'a str,
    /// Artefacts in platform order.
    pub artifacts: Vec<&'a ArtifactEntry>,
}
