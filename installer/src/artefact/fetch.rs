//! Streaming artefact fetch with checksum verification.
//!
//! Bytes are written to a temporary file while a SHA-256 digest is computed
//! over them, so the archive is read from the network exactly once. The
//! temporary file is deleted when the fetch is cancelled, fails, or the
//! digest does not match; unverified bytes never reach the installer.

use super::download::{ArtefactDownloader, DownloadError};
use crate::manifest::{ArtifactEntry, Sha256Digest};
use log::{debug, trace};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

const CHUNK_SIZE: usize = 64 * 1024;

/// Cooperative cancellation flag shared between a fetch and its caller.
///
/// Cloning yields a handle to the same flag. The token also tracks the
/// temporary files of fetches in flight, so an interrupt handler can remove
/// them when a read is blocked and the fetch cannot observe the flag.
///
/// # Examples
///
/// ```
/// use release_installer::artefact::fetch::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    scratch: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every fetch observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Return true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return the temporary files currently held by fetches.
    #[must_use]
    pub fn scratch_paths(&self) -> Vec<PathBuf> {
        self.scratch_set().iter().cloned().collect()
    }

    /// Delete every tracked temporary file and return how many were removed.
    pub fn discard_scratch(&self) -> usize {
        let paths = std::mem::take(&mut *self.scratch_set());
        paths
            .iter()
            .filter(|path| std::fs::remove_file(path).is_ok())
            .count()
    }

    fn track(&self, path: &Path) {
        self.scratch_set().insert(path.to_path_buf());
    }

    fn untrack(&self, path: &Path) {
        self.scratch_set().remove(path);
    }

    fn scratch_set(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.scratch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A temporary download file registered with its [`CancelToken`].
#[derive(Debug)]
struct ScratchFile {
    file: NamedTempFile,
    cancel: CancelToken,
}

impl ScratchFile {
    fn new(file: NamedTempFile, cancel: CancelToken) -> Self {
        cancel.track(file.path());
        Self { file, cancel }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.cancel.untrack(self.file.path());
    }
}

/// Errors arising from fetching and verifying an artefact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The transport failed or the fetch was cancelled.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The downloaded bytes do not hash to the manifest checksum.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The URL the bytes came from.
        url: String,
        /// The digest recorded in the manifest.
        expected: Sha256Digest,
        /// The digest of the received bytes.
        actual: Sha256Digest,
    },

    /// The temporary download file could not be created or written.
    #[error("failed to write temporary download file: {0}")]
    Scratch(#[source] std::io::Error),
}

/// An artefact that has been downloaded but not yet verified.
#[derive(Debug)]
pub struct DownloadedArtefact {
    file: ScratchFile,
    url: String,
    digest: Sha256Digest,
    size: u64,
}

impl DownloadedArtefact {
    /// Return the SHA-256 digest of the received bytes.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Return the number of bytes received.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Compare the received digest with `expected`.
    ///
    /// On mismatch the temporary file is dropped, and with it deleted.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ChecksumMismatch`] when the digests differ.
    pub fn verify(self, expected: &Sha256Digest) -> Result<VerifiedArtefact, FetchError> {
        if &self.digest != expected {
            return Err(FetchError::ChecksumMismatch {
                url: self.url,
                expected: expected.clone(),
                actual: self.digest,
            });
        }
        debug!("checksum verified for {} ({} bytes)", self.url, self.size);
        Ok(VerifiedArtefact {
            file: self.file,
            url: self.url,
            digest: self.digest,
            size: self.size,
        })
    }
}

/// An artefact whose bytes match the manifest checksum.
///
/// The backing temporary file lives as long as this value.
#[derive(Debug)]
pub struct VerifiedArtefact {
    file: ScratchFile,
    url: String,
    digest: Sha256Digest,
    size: u64,
}

impl VerifiedArtefact {
    /// Return the path of the verified archive on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.file.path()
    }

    /// Return the URL the archive was fetched from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the verified digest.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Return the archive size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Downloads artefacts into temporary files and verifies their checksums.
pub struct Fetcher<'a> {
    downloader: &'a dyn ArtefactDownloader,
    cancel: CancelToken,
    scratch_dir: Option<PathBuf>,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over `downloader` observing `cancel`.
    #[must_use]
    pub fn new(downloader: &'a dyn ArtefactDownloader, cancel: CancelToken) -> Self {
        Self {
            downloader,
            cancel,
            scratch_dir: None,
        }
    }

    /// Place temporary download files in `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Download and verify `entry` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Download`] on transport failure or
    /// cancellation, and [`FetchError::ChecksumMismatch`] when the bytes do
    /// not match the manifest.
    pub fn fetch(&self, entry: &ArtifactEntry) -> Result<VerifiedArtefact, FetchError> {
        self.download(entry)?.verify(entry.checksum())
    }

    /// Stream `entry.url()` into a temporary file, hashing as it goes.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Download`] on transport failure or
    /// cancellation and [`FetchError::Scratch`] when the temporary file
    /// cannot be written. The partial file is removed in every error case.
    pub fn download(&self, entry: &ArtifactEntry) -> Result<DownloadedArtefact, FetchError> {
        let url = entry.url();
        self.check_cancelled(url)?;

        let mut reader = self.downloader.open(url)?;
        let scratch = self.scratch_file().map_err(FetchError::Scratch)?;
        let mut file = ScratchFile::new(scratch, self.cancel.clone());
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut size: u64 = 0;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    self.check_cancelled(url)?;
                    continue;
                }
                Err(e) => {
                    return Err(DownloadError::HttpError {
                        url: url.to_owned(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            };
            self.check_cancelled(url)?;
            if bytes_read == 0 {
                break;
            }
            let chunk = buffer.get(..bytes_read).unwrap_or_default();
            hasher.update(chunk);
            file.file.write_all(chunk).map_err(FetchError::Scratch)?;
            size = size.saturating_add(bytes_read as u64);
            trace!("received {size} bytes from {url}");
        }
        file.file.as_file().sync_all().map_err(FetchError::Scratch)?;

        let digest = Sha256Digest::from_digest(&hasher.finalize());
        debug!("downloaded {size} bytes from {url} (sha256 {digest})");
        Ok(DownloadedArtefact {
            file,
            url: url.to_owned(),
            digest,
            size,
        })
    }

    fn check_cancelled(&self, url: &str) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled {
                url: url.to_owned(),
            });
        }
        Ok(())
    }

    fn scratch_file(&self) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".release-download-");
        match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}
