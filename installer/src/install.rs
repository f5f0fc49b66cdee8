//! Atomic installation of an extracted executable.
//!
//! A verified archive is unpacked into a scratch directory, the payload is
//! copied into a temporary file beside the destination, marked executable,
//! flushed, and renamed over `directory/binary`. A reader of the target path
//! sees either the previous binary or the new one, never a partial file.
//! Concurrent installs into the same directory are serialised by an
//! exclusive advisory lock on `directory/.<binary>.lock`.

use crate::artefact::extraction::{
    ArchiveFormat, ArtefactExtractor, ExtractionError, locate_payload,
};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Where a binary is installed: a directory and the file name inside it.
///
/// # Examples
///
/// ```
/// use release_installer::install::InstallTarget;
///
/// let target = InstallTarget::new("/home/user/.local/bin", "stardust");
/// assert_eq!(target.path().as_str(), "/home/user/.local/bin/stardust");
/// assert_eq!(target.lock_path().as_str(), "/home/user/.local/bin/.stardust.lock");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    directory: Utf8PathBuf,
    binary: String,
}

impl InstallTarget {
    /// Create a target for `binary` inside `directory`.
    #[must_use]
    pub fn new(directory: impl Into<Utf8PathBuf>, binary: &str) -> Self {
        Self {
            directory: directory.into(),
            binary: binary.to_owned(),
        }
    }

    /// Return the directory the binary is installed into.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Return the installed file name.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Return the full path of the installed binary.
    #[must_use]
    pub fn path(&self) -> Utf8PathBuf {
        self.directory.join(&self.binary)
    }

    /// Return the path of the advisory lock file guarding this target.
    #[must_use]
    pub fn lock_path(&self) -> Utf8PathBuf {
        self.directory.join(format!(".{}.lock", self.binary))
    }
}

/// Errors arising while writing the binary into its target directory.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The archive could not be unpacked or had no usable payload.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The target directory could not be created.
    #[error("failed to create install directory {path}: {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The install lock could not be acquired.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// The lock file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The payload could not be copied into a temporary file.
    #[error("failed to stage binary in {path}: {source}")]
    Stage {
        /// The directory the temporary file was created in.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The temporary file could not be renamed over the target.
    #[error("failed to move binary into place at {path}: {source}")]
    Commit {
        /// The destination path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive advisory lock on an install target, released on drop.
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: Utf8PathBuf,
}

impl TargetLock {
    /// Block until the lock for `target` is held.
    ///
    /// Creates the target directory when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::CreateDir`] or [`InstallError::Lock`] on
    /// filesystem failure.
    pub fn acquire(target: &InstallTarget) -> Result<Self, InstallError> {
        ensure_directory(target.directory())?;
        let path = target.lock_path();
        let lock_error = |source| InstallError::Lock {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_error)?;
        fs2::FileExt::lock_exclusive(&file).map_err(lock_error)?;
        debug!("acquired install lock {path}");
        Ok(Self { file, path })
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if fs2::FileExt::unlock(&self.file).is_err() {
            debug!("failed to release install lock {}", self.path);
        }
    }
}

/// A payload copied next to its destination but not yet renamed into place.
///
/// Dropping a staged binary without calling [`commit`](Self::commit)
/// deletes the temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedBinary {
    temp: NamedTempFile,
    destination: Utf8PathBuf,
}

impl StagedBinary {
    /// Copy `payload` into a temporary file in the target directory.
    ///
    /// The copy is marked executable (`0o755` on Unix) and flushed to disk.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Stage`] if the copy fails.
    pub fn stage(payload: &Path, target: &InstallTarget) -> Result<Self, InstallError> {
        let stage_error = |source| InstallError::Stage {
            path: target.directory().to_owned(),
            source,
        };
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", target.binary()))
            .suffix(".partial")
            .tempfile_in(target.directory())
            .map_err(stage_error)?;
        let mut source = File::open(payload).map_err(stage_error)?;
        std::io::copy(&mut source, temp.as_file_mut()).map_err(stage_error)?;
        make_executable(temp.as_file()).map_err(stage_error)?;
        temp.as_file().sync_all().map_err(stage_error)?;
        Ok(Self {
            temp,
            destination: target.path(),
        })
    }

    /// Return the path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the staged file over the destination.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Commit`] if the rename fails; the temporary
    /// file is removed in that case.
    pub fn commit(self) -> Result<Utf8PathBuf, InstallError> {
        let Self { temp, destination } = self;
        temp.persist(&destination)
            .map_err(|err| InstallError::Commit {
                path: destination.clone(),
                source: err.error,
            })?;
        Ok(destination)
    }
}

#[cfg(unix)]
fn make_executable(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_file: &File) -> std::io::Result<()> {
    Ok(())
}

fn ensure_directory(directory: &Utf8Path) -> Result<(), InstallError> {
    fs::create_dir_all(directory).map_err(|source| InstallError::CreateDir {
        path: directory.to_owned(),
        source,
    })
}

/// An executable unpacked into a scratch directory.
///
/// The scratch directory is removed when this value drops.
#[derive(Debug)]
pub struct ExtractedPayload {
    scratch: TempDir,
    relative: PathBuf,
}

impl ExtractedPayload {
    /// Return the absolute path of the payload file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.scratch.path().join(&self.relative)
    }

    /// Return the payload path relative to the archive root.
    #[must_use]
    pub fn archive_path(&self) -> &Path {
        &self.relative
    }
}

/// Extracts verified archives and writes their payload into place.
pub struct Installer<'a> {
    extractor: &'a dyn ArtefactExtractor,
}

impl<'a> Installer<'a> {
    /// Create an installer backed by `extractor`.
    #[must_use]
    pub fn new(extractor: &'a dyn ArtefactExtractor) -> Self {
        Self { extractor }
    }

    /// Unpack `archive` and locate the executable named `binary`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionError`] when the archive is malformed, unsafe,
    /// or has no unique payload.
    pub fn extract_payload(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        binary: &str,
    ) -> Result<ExtractedPayload, ExtractionError> {
        let scratch = tempfile::Builder::new()
            .prefix(".release-extract-")
            .tempdir()?;
        let files = self.extractor.extract(archive, format, scratch.path())?;
        let relative = locate_payload(&files, binary)?;
        debug!("payload located at {}", relative.display());
        Ok(ExtractedPayload { scratch, relative })
    }

    /// Write `payload` to `target` under the target lock.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] when the directory cannot be prepared,
    /// the lock cannot be taken, or the write or rename fails.
    pub fn write(
        &self,
        payload: &ExtractedPayload,
        target: &InstallTarget,
    ) -> Result<Utf8PathBuf, InstallError> {
        let _lock = TargetLock::acquire(target)?;
        let staged = StagedBinary::stage(&payload.path(), target)?;
        let installed = staged.commit()?;
        info!("installed {installed}");
        Ok(installed)
    }

    /// Extract `archive` and install its payload to `target` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Extraction`] for archive failures and the
    /// other [`InstallError`] variants for filesystem failures.
    pub fn install(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        target: &InstallTarget,
    ) -> Result<Utf8PathBuf, InstallError> {
        let payload = self.extract_payload(archive, format, target.binary())?;
        self.write(&payload, target)
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
