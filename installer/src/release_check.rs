//! Whole-release checksum audit.
//!
//! Fetches every artefact of one release in parallel and verifies each
//! against its manifest checksum. Used before publishing a manifest
//! revision to confirm that every URL serves the bytes the manifest claims.
//! Artefacts are fetched on scoped threads that share no mutable state; the
//! downloaded bytes are discarded once hashed.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::fetch::{CancelToken, Fetcher};
use crate::error::{InstallerError, Result};
use crate::manifest::{ManifestStore, Sha256Digest};
use crate::platform::Platform;
use log::{debug, warn};
use semver::Version;

/// Outcome of checking one artefact.
#[derive(Debug)]
pub struct ArtifactCheck {
    /// Platform slot of the artefact.
    pub platform: Platform,
    /// URL that was fetched.
    pub url: String,
    /// Verified digest and size, or the failure.
    pub result: Result<CheckedArtifact>,
}

/// A successfully verified artefact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedArtifact {
    /// Digest of the received bytes (equal to the manifest checksum).
    pub digest: Sha256Digest,
    /// Number of bytes received.
    pub size: u64,
}

/// Per-artefact results for one release, in platform order.
#[derive(Debug)]
pub struct ReleaseReport {
    /// The release that was checked.
    pub version: Version,
    /// One entry per artefact.
    pub checks: Vec<ArtifactCheck>,
}

impl ReleaseReport {
    /// Return true when every artefact verified.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|check| check.result.is_ok())
    }

    /// Return the number of failed artefacts.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| check.result.is_err())
            .count()
    }

    /// Consume the report and return the first failure, if any.
    #[must_use]
    pub fn into_first_failure(self) -> Option<InstallerError> {
        self.checks
            .into_iter()
            .find_map(|check| check.result.err())
    }

    /// Format the report for display, one line per artefact.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![format!("Release {}:", self.version)];
        for check in &self.checks {
            lines.push(match &check.result {
                Ok(checked) => format!(
                    "  ok    {:<13} {} ({} bytes)",
                    check.platform.to_string(),
                    checked.digest,
                    checked.size
                ),
                Err(err) => format!("  FAIL  {:<13} {err}", check.platform.to_string()),
            });
        }
        lines.push(format!(
            "{} of {} artifacts verified",
            self.checks.len().saturating_sub(self.failure_count()),
            self.checks.len()
        ));
        lines.join("\n")
    }
}

/// Fetch and verify every artefact of `version` in parallel.
///
/// # Errors
///
/// Returns [`InstallerError::NotFound`] when the release does not exist.
/// Per-artefact failures are recorded in the report rather than returned.
pub fn check_release(
    store: &ManifestStore,
    version: &str,
    downloader: &(dyn ArtefactDownloader + Sync),
    cancel: &CancelToken,
) -> Result<ReleaseReport> {
    let release = store.release(version)?;
    let entries: Vec<_> = release.artifacts().collect();
    debug!(
        "checking {} artifact(s) of release {}",
        entries.len(),
        release.version()
    );

    let checks: Vec<ArtifactCheck> = std::thread::scope(|scope| {
        let handles: Vec<_> = entries
            .iter()
            .map(|entry| {
                scope.spawn(move || {
                    Fetcher::new(downloader, cancel.clone())
                        .fetch(entry)
                        .map(|verified| CheckedArtifact {
                            digest: verified.digest().clone(),
                            size: verified.size(),
                        })
                        .map_err(InstallerError::from)
                })
            })
            .collect();

        handles
            .into_iter()
            .zip(&entries)
            .map(|(handle, entry)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(InstallerError::Io(std::io::Error::other(
                        "artifact check thread panicked",
                    )))
                });
                if let Err(err) = &result {
                    warn!("{} failed: {err}", entry.platform());
                }
                ArtifactCheck {
                    platform: entry.platform(),
                    url: entry.url().to_owned(),
                    result,
                }
            })
            .collect()
    });

    Ok(ReleaseReport {
        version: release.version().clone(),
        checks,
    })
}
