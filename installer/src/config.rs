//! Layered configuration.
//!
//! Settings are resolved from, in decreasing precedence: command-line flags,
//! environment variables, an optional TOML file, and built-in defaults. The
//! TOML file is `config.toml` in the per-user config directory unless
//! `--config` names another one.

use crate::artefact::download::DEFAULT_DOWNLOAD_TIMEOUT;
use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use crate::verify::VerifyPolicy;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the manifest file.
pub const MANIFEST_ENV: &str = "RELEASE_INSTALLER_MANIFEST";

/// Environment variable naming the install directory.
pub const BIN_DIR_ENV: &str = "RELEASE_INSTALLER_BIN_DIR";

/// File name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// File name of the default manifest inside the config directory.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

/// Contents of the optional TOML configuration file.
///
/// # Examples
///
/// ```
/// use release_installer::config::FileConfig;
///
/// let config = FileConfig::parse("bin_dir = \"/opt/bin\"\ntimeout_secs = 30\n")
///     .expect("valid config");
/// assert_eq!(config.timeout_secs, Some(30));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Manifest file path.
    pub manifest: Option<Utf8PathBuf>,
    /// Install directory.
    pub bin_dir: Option<Utf8PathBuf>,
    /// Download timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Version-check policy.
    pub verify_policy: Option<VerifyPolicy>,
}

impl FileConfig {
    /// Parse TOML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Config`] for malformed TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| InstallerError::Config {
            reason: format!("invalid configuration: {e}"),
        })
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Config`] when the file cannot be read or
    /// parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InstallerError::Config {
            reason: format!("failed to read {path}: {e}"),
        })?;
        Self::parse(&text).map_err(|err| match err {
            InstallerError::Config { reason } => InstallerError::Config {
                reason: format!("{path}: {reason}"),
            },
            other => other,
        })
    }

    /// Load `explicit` when given, else the default file if it exists.
    ///
    /// A missing default file yields an empty configuration; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Config`] when a file that should be read
    /// cannot be read or parsed.
    pub fn discover(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let Some(dir) = dirs.config_dir() else {
            return Ok(Self::default());
        };
        let path = utf8_dir(dir)?.join(CONFIG_FILE_NAME);
        if path.is_file() {
            debug!("loading configuration from {path}");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Values supplied on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Explicit configuration file.
    pub config: Option<Utf8PathBuf>,
    /// Manifest file path.
    pub manifest: Option<Utf8PathBuf>,
    /// Install directory.
    pub bin_dir: Option<Utf8PathBuf>,
    /// Download timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Version-check policy.
    pub verify_policy: Option<VerifyPolicy>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Manifest file to load.
    pub manifest: Utf8PathBuf,
    /// Directory binaries are installed into.
    pub bin_dir: Utf8PathBuf,
    /// Download timeout.
    pub timeout: Duration,
    /// Version-check policy.
    pub verify_policy: VerifyPolicy,
}

impl Settings {
    /// Resolve settings from flags, environment, config file and defaults.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Config`] when the configuration file is
    /// invalid, no manifest can be determined, the timeout is zero, or a
    /// directory path is not valid UTF-8.
    pub fn resolve(overrides: &Overrides, dirs: &dyn BaseDirs) -> Result<Self> {
        let file = FileConfig::discover(overrides.config.as_deref(), dirs)?;

        let manifest = match first_of(
            overrides.manifest.clone(),
            env_path(MANIFEST_ENV),
            file.manifest,
        ) {
            Some(path) => path,
            None => default_manifest(dirs)?,
        };
        let bin_dir = match first_of(
            overrides.bin_dir.clone(),
            env_path(BIN_DIR_ENV),
            file.bin_dir,
        ) {
            Some(path) => path,
            None => default_bin_dir(dirs)?,
        };
        let timeout = match overrides.timeout_secs.or(file.timeout_secs) {
            Some(0) => {
                return Err(InstallerError::Config {
                    reason: "timeout_secs must be at least 1 second".to_owned(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_DOWNLOAD_TIMEOUT,
        };
        let verify_policy = overrides
            .verify_policy
            .or(file.verify_policy)
            .unwrap_or_default();

        debug!("manifest: {manifest}, bin dir: {bin_dir}, timeout: {timeout:?}");
        Ok(Self {
            manifest,
            bin_dir,
            timeout,
            verify_policy,
        })
    }
}

fn first_of<T>(flag: Option<T>, env: Option<T>, file: Option<T>) -> Option<T> {
    flag.or(env).or(file)
}

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(Utf8PathBuf::from)
}

fn utf8_dir(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|p| InstallerError::Config {
        reason: format!("directory is not valid UTF-8: {}", p.display()),
    })
}

fn default_manifest(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let candidate = dirs
        .config_dir()
        .map(utf8_dir)
        .transpose()?
        .map(|dir| dir.join(DEFAULT_MANIFEST_NAME))
        .filter(|path| path.is_file());
    candidate.ok_or_else(|| InstallerError::Config {
        reason: format!("no manifest given; pass --manifest or set {MANIFEST_ENV}"),
    })
}

fn default_bin_dir(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let dir = dirs.bin_dir().ok_or_else(|| InstallerError::Config {
        reason: format!("could not determine a bin directory; pass --bin-dir or set {BIN_DIR_ENV}"),
    })?;
    utf8_dir(dir)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
