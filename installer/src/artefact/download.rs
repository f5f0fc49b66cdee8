//! Artefact download transport.
//!
//! Provides a trait-based abstraction over the byte source for an artefact
//! URL, enabling dependency injection for testing. The production
//! implementation speaks HTTP(S) through `ureq` and reads `file://` URLs or
//! bare paths from the local filesystem, which is how mirrors and tests
//! serve archives without a network.

use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default network timeout for a single artefact download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Trait for opening the byte stream behind an artefact URL.
///
/// Abstractions allow tests to supply bytes without network access.
///
/// # Examples
///
/// ```
/// use release_installer::artefact::download::{DEFAULT_DOWNLOAD_TIMEOUT, HttpDownloader};
///
/// let downloader = HttpDownloader::new(DEFAULT_DOWNLOAD_TIMEOUT);
/// // Use downloader.open("https://...") in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Open a reader over the body served at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the local file cannot be opened.
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError>;
}

/// Errors arising from artefact download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request or body transfer failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested artefact was not found (HTTP 404).
    #[error("artifact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The URL scheme is neither HTTP(S) nor `file`.
    #[error("unsupported URL scheme: {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
    },

    /// A local artefact file could not be opened.
    #[error("failed to open local artifact {path}: {source}")]
    LocalFile {
        /// The local path that was requested.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The download was cancelled before it completed.
    #[error("download cancelled: {url}")]
    Cancelled {
        /// The URL whose download was abandoned.
        url: String,
    },
}

/// Downloader using `ureq` for HTTP(S) and the filesystem for local URLs.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TIMEOUT)
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError> {
        match classify(url) {
            Source::Http => {
                debug!("requesting {url}");
                let response = self
                    .agent
                    .get(url)
                    .call()
                    .map_err(|e| map_ureq_error(url, &e))?;
                Ok(Box::new(response.into_body().into_reader()))
            }
            Source::Local(path) => {
                debug!("reading local artifact {}", path.display());
                let file = std::fs::File::open(path).map_err(|source| DownloadError::LocalFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            Source::Unsupported => Err(DownloadError::UnsupportedScheme {
                url: url.to_owned(),
            }),
        }
    }
}

/// Where the bytes behind a URL live.
#[derive(Debug, PartialEq, Eq)]
enum Source<'a> {
    Http,
    Local(&'a Path),
    Unsupported,
}

fn classify(url: &str) -> Source<'_> {
    if let Some(path) = url.strip_prefix("file://") {
        return Source::Local(Path::new(path));
    }
    match url.split_once("://") {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("http") => Source::Http,
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("https") => Source::Http,
        Some(_) => Source::Unsupported,
        None => Source::Local(Path::new(url)),
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
