//! Directory resolution abstraction for platform-specific paths.
//!
//! The [`BaseDirs`] trait lets configuration code ask for the home, config
//! and binary directories without touching the real environment in tests.

use std::path::PathBuf;

/// Application name used for the per-user configuration directory.
pub const APP_NAME: &str = "release-installer";

/// Source of the per-user directories the installer relies on.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Return the user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Return the default directory binaries are installed into.
    fn bin_dir(&self) -> Option<PathBuf>;

    /// Return the installer's configuration directory.
    fn config_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
///
/// The default binary directory is `~/.local/bin` on every platform.
///
/// # Examples
///
/// ```no_run
/// use release_installer::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs;
/// if let Some(bin) = dirs.bin_dir() {
///     println!("binaries go to {}", bin.display());
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }

    fn bin_dir(&self) -> Option<PathBuf> {
        self.home_dir().map(|home| home.join(".local").join("bin"))
    }

    fn config_dir(&self) -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}
