//! Archive extraction for downloaded release artefacts.
//!
//! Supports `.tar.gz`, `.tar.zst` and `.zip` archives plus bare executables,
//! with path traversal protection to prevent zip-slip attacks. Only regular
//! files are written; symlinks and hard links inside archives are skipped.

use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// File name given to a bare (non-archive) download inside the
/// extraction directory.
pub const RAW_PAYLOAD_NAME: &str = "payload";

const SYMLINK_MODE: u32 = 0o120_000;
const FILE_TYPE_MASK: u32 = 0o170_000;

/// Container format of a downloaded artefact, derived from its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball (`.tar.gz`, `.tgz`).
    TarGz,
    /// Zstandard-compressed tarball (`.tar.zst`, `.tzst`).
    TarZst,
    /// Zip archive (`.zip`).
    Zip,
    /// The download is the executable itself.
    Raw,
}

impl ArchiveFormat {
    /// Infer the format from the path part of `url`.
    ///
    /// Query strings and fragments are ignored; matching is
    /// case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_installer::artefact::extraction::ArchiveFormat;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::from_url("https://host/stardust-linux-x64.tar.gz"),
    ///     ArchiveFormat::TarGz
    /// );
    /// assert_eq!(
    ///     ArchiveFormat::from_url("https://host/stardust?sig=abc"),
    ///     ArchiveFormat::Raw
    /// );
    /// ```
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Self::TarGz
        } else if path.ends_with(".tar.zst") || path.ends_with(".tzst") {
            Self::TarZst
        } else if path.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }
}

/// Trait for extracting artefact archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use release_installer::artefact::extraction::ArchiveExtractor;
///
/// let extractor = ArchiveExtractor;
/// // Use extractor.extract(archive_path, format, dest_dir) in production
/// # let _ = extractor;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the paths, relative to `dest_dir`, of the regular files that
    /// were extracted.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry
    /// attempts to escape the destination directory.
    /// Returns [`ExtractionError::EmptyArchive`] if no files are found.
    /// Returns [`ExtractionError::Io`] or [`ExtractionError::Zip`] when the
    /// archive is malformed.
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be read.
    #[error("malformed zip archive: {reason}")]
    Zip {
        /// Description of the failure.
        reason: String,
    },

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no regular files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// No file in the archive is named after the binary.
    #[error("archive has no executable named \"{binary}\" (found: {found})")]
    MissingPayload {
        /// The binary name that was searched for.
        binary: String,
        /// Comma-separated list of the files the archive does contain.
        found: String,
    },

    /// More than one file in the archive is named after the binary.
    #[error("archive contains {count} files named \"{binary}\"")]
    AmbiguousPayload {
        /// The binary name that was searched for.
        binary: String,
        /// How many candidates matched.
        count: usize,
    },
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Zip {
                reason: other.to_string(),
            },
        }
    }
}

/// Default extractor using the `tar`, `flate2`, `zstd` and `zip` crates.
///
/// Validates each entry path before extraction to guard against
/// path traversal attacks (zip-slip).
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl ArtefactExtractor for ArchiveExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        format: ArchiveFormat,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let file = File::open(archive_path)?;
        let extracted = match format {
            ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(file), dest_dir)?,
            ArchiveFormat::TarZst => extract_tar(zstd::Decoder::new(file)?, dest_dir)?,
            ArchiveFormat::Zip => extract_zip(file, dest_dir)?,
            ArchiveFormat::Raw => {
                drop(file);
                std::fs::copy(archive_path, dest_dir.join(RAW_PAYLOAD_NAME))?;
                vec![PathBuf::from(RAW_PAYLOAD_NAME)]
            }
        };

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }
        debug!(
            "extracted {} file(s) from {} as {format:?}",
            extracted.len(),
            archive_path.display()
        );
        Ok(extracted)
    }
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() {
            if !entry_type.is_dir() {
                debug!("skipping non-regular entry {}", entry_path.display());
            }
            continue;
        }

        let dest_path = dest_dir.join(&entry_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        entry.unpack(&dest_path)?;
        push_unique(&mut extracted, entry_path);
    }

    Ok(extracted)
}

fn extract_zip(file: File, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(entry_path) = entry.enclosed_name() else {
            return Err(ExtractionError::PathTraversal {
                path: entry.name().to_owned(),
            });
        };
        validate_entry_path(&entry_path)?;

        let mode = entry.unix_mode();
        if entry.is_dir() {
            continue;
        }
        if mode.is_some_and(|m| m & FILE_TYPE_MASK == SYMLINK_MODE) {
            debug!("skipping symlink entry {}", entry_path.display());
            continue;
        }

        let dest_path = dest_dir.join(&entry_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut out)?;
        apply_mode(&dest_path, mode)?;
        push_unique(&mut extracted, entry_path);
    }

    Ok(extracted)
}

/// Records an extracted path once; a repeated entry overwrites the same file.
fn push_unique(extracted: &mut Vec<PathBuf>, path: PathBuf) {
    if !extracted.contains(&path) {
        extracted.push(path);
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(bits) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(bits & 0o7777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir | Component::Prefix(_)) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Pick the executable payload out of the extracted `files`.
///
/// A file whose name is `binary` (or `binary.exe`) wins, wherever it sits in
/// the archive. Without one, an archive holding exactly one file yields that
/// file.
///
/// # Errors
///
/// Returns [`ExtractionError::AmbiguousPayload`] when several files carry
/// the binary's name, [`ExtractionError::MissingPayload`] when none does and
/// the archive holds several files, and [`ExtractionError::EmptyArchive`]
/// when `files` is empty.
///
/// # Examples
///
/// ```
/// use release_installer::artefact::extraction::locate_payload;
/// use std::path::PathBuf;
///
/// let files = vec![PathBuf::from("LICENSE"), PathBuf::from("bin/stardust")];
/// let payload = locate_payload(&files, "stardust").expect("payload present");
/// assert_eq!(payload, PathBuf::from("bin/stardust"));
/// ```
pub fn locate_payload(files: &[PathBuf], binary: &str) -> Result<PathBuf, ExtractionError> {
    let windows_name = format!("{binary}.exe");
    let matches: Vec<&PathBuf> = files
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name == binary || name == windows_name)
        })
        .collect();

    match (matches.as_slice(), files) {
        ([single], _) => Ok((*single).clone()),
        ([], []) => Err(ExtractionError::EmptyArchive),
        ([], [only]) => Ok(only.clone()),
        ([], _) => Err(ExtractionError::MissingPayload {
            binary: binary.to_owned(),
            found: files
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
        (many, _) => Err(ExtractionError::AmbiguousPayload {
            binary: binary.to_owned(),
            count: many.len(),
        }),
    }
}
