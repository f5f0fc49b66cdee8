//! Error types for manifest loading and lookup.
//!
//! Load-time errors name the release and platform at fault so a broken
//! manifest can be fixed without guesswork.

use crate::platform::Platform;
use thiserror::Error;

/// Errors arising from an invalid manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {reason}")]
    Read {
        /// Path of the manifest file.
        path: String,
        /// Description of the I/O failure.
        reason: String,
    },

    /// The document is not valid JSON or does not match the schema.
    #[error("manifest parse error: {reason}")]
    Parse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A required text field is empty.
    #[error("manifest field `{field}` must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A release version is not a semantic version.
    #[error("invalid release version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version string.
        value: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// The same version is published twice.
    #[error("release {version} is listed more than once")]
    DuplicateRelease {
        /// The repeated version.
        version: String,
    },

    /// A release has no artefacts.
    #[error("release {version} has no artifacts")]
    EmptyRelease {
        /// The release version.
        version: String,
    },

    /// A release lists two artefacts for the same platform.
    #[error("release {version} lists {platform} more than once")]
    DuplicateArtifact {
        /// The release version.
        version: String,
        /// The repeated platform.
        platform: Platform,
    },

    /// An artefact URL is empty after templating.
    #[error("release {version} has an empty URL for {platform}")]
    EmptyUrl {
        /// The release version.
        version: String,
        /// The platform of the artefact.
        platform: Platform,
    },

    /// An artefact checksum is not a valid SHA-256 digest.
    #[error("release {version} has an invalid checksum for {platform}: {reason}")]
    InvalidChecksum {
        /// The release version.
        version: String,
        /// The platform of the artefact.
        platform: Platform,
        /// Description of the validation failure.
        reason: String,
    },

    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },
}

/// Errors arising from resolving a release or artefact in a loaded manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The manifest contains no releases.
    #[error("manifest contains no releases")]
    NoReleases,

    /// The requested version is not published.
    #[error("version {version} not found in manifest")]
    UnknownVersion {
        /// The requested version as given by the caller.
        version: String,
    },

    /// The release exists but has no artefact for this platform.
    #[error("no artifact for {platform} in release {version}")]
    NoArtifact {
        /// The release version.
        version: String,
        /// The requested platform.
        platform: Platform,
    },
}

/// Result type alias using [`ManifestError`].
pub type Result<T> = std::result::Result<T, ManifestError>;
