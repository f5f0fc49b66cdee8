//! Error types for the release installer CLI.
//!
//! Each module reports failures through its own `thiserror` enum; this module
//! folds them into [`InstallerError`], which names the failure category the
//! user sees and maps it to a process exit code.

use crate::artefact::download::DownloadError;
use crate::artefact::extraction::ExtractionError;
use crate::artefact::fetch::FetchError;
use crate::install::InstallError;
use crate::manifest::{LookupError, ManifestError, Sha256Digest};
use crate::pipeline::Stage;
use crate::platform::UnsupportedPlatform;
use crate::verify::VerifyError;
use thiserror::Error;

/// Errors that can occur while installing or inspecting releases.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// No manifest entry matches the requested version and platform.
    #[error(transparent)]
    NotFound(#[from] LookupError),

    /// The host is outside the supported OS/architecture matrix.
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    /// The artefact could not be downloaded.
    #[error(transparent)]
    DownloadFailed(#[from] DownloadError),

    /// The downloaded bytes do not match the manifest checksum.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The URL the bytes came from.
        url: String,
        /// The digest recorded in the manifest.
        expected: Sha256Digest,
        /// The digest of the received bytes.
        actual: Sha256Digest,
    },

    /// The archive is malformed or holds no unique executable.
    #[error(transparent)]
    ExtractionFailed(#[from] ExtractionError),

    /// The binary could not be written into the target directory.
    #[error(transparent)]
    WriteFailed(InstallError),

    /// The installed binary did not report the expected version.
    #[error(transparent)]
    VersionMismatch(#[from] VerifyError),

    /// The manifest could not be read or failed validation.
    #[error(transparent)]
    InvalidManifest(#[from] ManifestError),

    /// Settings could not be resolved from flags, environment or file.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the problem.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    OutputFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// A pipeline stage failed; wraps the underlying category.
    #[error("{stage} failed: {source}")]
    StageFailed {
        /// The stage that was running.
        stage: Stage,
        /// The failure itself.
        source: Box<InstallerError>,
    },
}

impl InstallerError {
    /// Attach the pipeline stage at which this error occurred.
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        Self::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Return the pipeline stage recorded on this error, if any.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Return the error with any stage wrapper removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Map the error category to the process exit code.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_installer::error::InstallerError;
    /// use release_installer::manifest::LookupError;
    ///
    /// let err = InstallerError::from(LookupError::NoReleases);
    /// assert_eq!(err.exit_code(), 2);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Self::NotFound(_) => 2,
            Self::UnsupportedPlatform(_) => 3,
            Self::DownloadFailed(_) => 4,
            Self::ChecksumMismatch { .. } => 5,
            Self::ExtractionFailed(_) => 6,
            Self::WriteFailed(_) => 7,
            Self::VersionMismatch(_) => 8,
            Self::InvalidManifest(_) => 9,
            Self::Config { .. } => 10,
            Self::Io(_) | Self::OutputFailed { .. } | Self::StageFailed { .. } => 1,
        }
    }
}

impl From<FetchError> for InstallerError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Download(download) => Self::DownloadFailed(download),
            FetchError::ChecksumMismatch {
                url,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                url,
                expected,
                actual,
            },
            FetchError::Scratch(io) => Self::Io(io),
        }
    }
}

impl From<InstallError> for InstallerError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::Extraction(extraction) => Self::ExtractionFailed(extraction),
            other => Self::WriteFailed(other),
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os, Platform};
    use rstest::rstest;

    fn digest(fill: char) -> Sha256Digest {
        Sha256Digest::try_from(fill.to_string().repeat(64)).expect("valid digest")
    }

    #[rstest]
    #[case::not_found(InstallerError::from(LookupError::NoArtifact {
        version: "0.4.0".to_owned(),
        platform: Platform::new(Os::Windows, Arch::X64),
    }), 2)]
    #[case::unsupported(InstallerError::from(UnsupportedPlatform::Arch {
        value: "riscv64".to_owned(),
    }), 3)]
    #[case::download(InstallerError::from(DownloadError::NotFound {
        url: "https://example.test/a.tar.gz".to_owned(),
    }), 4)]
    #[case::checksum(InstallerError::ChecksumMismatch {
        url: "https://example.test/a.tar.gz".to_owned(),
        expected: digest('a'),
        actual: digest('b'),
    }, 5)]
    #[case::extraction(InstallerError::from(ExtractionError::EmptyArchive), 6)]
    #[case::write(InstallerError::from(InstallError::Commit {
        path: "/bin/stardust".into(),
        source: std::io::Error::other("read-only filesystem"),
    }), 7)]
    #[case::version(InstallerError::from(VerifyError::Mismatch {
        expected: "Stardust v0.4.0".to_owned(),
        output: "Stardust v0.1.0".to_owned(),
    }), 8)]
    #[case::manifest(InstallerError::from(ManifestError::Parse {
        reason: "expected value".to_owned(),
    }), 9)]
    #[case::config(InstallerError::Config { reason: "bad toml".to_owned() }, 10)]
    #[case::io(InstallerError::Io(std::io::Error::other("disk")), 1)]
    fn maps_categories_to_exit_codes(#[case] err: InstallerError, #[case] expected: i32) {
        assert_eq!(err.exit_code(), expected);
    }

    #[test]
    fn stage_wrapper_keeps_exit_code_and_names_stage() {
        let err = InstallerError::from(ExtractionError::EmptyArchive).at(Stage::Extracting);

        assert_eq!(err.exit_code(), 6);
        assert_eq!(err.stage(), Some(Stage::Extracting));
        assert!(err.to_string().starts_with("extracting failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn install_extraction_errors_are_extraction_failures() {
        let err = InstallerError::from(InstallError::Extraction(ExtractionError::EmptyArchive));
        assert!(matches!(err, InstallerError::ExtractionFailed(_)));
    }

    #[test]
    fn fetch_checksum_mismatch_is_preserved() {
        let err = InstallerError::from(FetchError::ChecksumMismatch {
            url: "https://example.test/a.tar.gz".to_owned(),
            expected: digest('a'),
            actual: digest('c'),
        });
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains(&"c".repeat(64)));
    }

    #[test]
    fn output_failed_preserves_source() {
        let err = InstallerError::OutputFailed {
            source: std::io::Error::other("broken pipe"),
        };
        assert!(err.to_string().contains("write"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
