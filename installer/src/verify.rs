//! Post-install smoke test.
//!
//! Runs the installed binary with its version flag and checks that stdout
//! contains the expected version string. A hung binary is killed after a
//! timeout.

use crate::manifest::Tool;
use log::{debug, warn};
use semver::Version;
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default time the installed binary has to answer its version flag.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when the installed binary reports an unexpected version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// Fail the install.
    #[default]
    Fail,
    /// Log a warning and report success.
    Warn,
}

/// Errors arising from running or checking the installed binary.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The binary could not be started.
    #[error("failed to run {binary}: {source}")]
    Spawn {
        /// The binary that was executed.
        binary: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for or reading from the binary failed.
    #[error("failed to read output of {binary}: {source}")]
    Io {
        /// The binary that was executed.
        binary: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The binary did not exit within the timeout and was killed.
    #[error("{binary} did not answer {flag} within {seconds} seconds")]
    TimedOut {
        /// The binary that was executed.
        binary: String,
        /// The flag that was passed.
        flag: String,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The binary exited unsuccessfully.
    #[error("{binary} {flag} exited with {status}: {stderr}")]
    Failed {
        /// The binary that was executed.
        binary: String,
        /// The flag that was passed.
        flag: String,
        /// Exit status description.
        status: String,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The output did not contain the expected version string.
    #[error("expected output containing \"{expected}\", got \"{output}\"")]
    Mismatch {
        /// The string the output had to contain.
        expected: String,
        /// The trimmed standard output.
        output: String,
    },
}

/// Trait for querying an installed binary, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait VersionProbe {
    /// Run `binary flag` and return its standard output.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] if the binary cannot be run, times out, or
    /// exits unsuccessfully.
    fn query(&self, binary: &Path, flag: &str) -> Result<String, VerifyError>;
}

/// Probe that spawns the binary as a child process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessProbe {
    timeout: Duration,
}

impl ProcessProbe {
    /// Create a probe that kills the child after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_TIMEOUT)
    }
}

impl VersionProbe for ProcessProbe {
    fn query(&self, binary: &Path, flag: &str) -> Result<String, VerifyError> {
        let name = binary.display().to_string();
        let io_error = |source| VerifyError::Io {
            binary: name.clone(),
            source,
        };

        let mut child = Command::new(binary)
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VerifyError::Spawn {
                binary: name.clone(),
                source,
            })?;

        let Some(status) = child.wait_timeout(self.timeout).map_err(io_error)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VerifyError::TimedOut {
                binary: name,
                flag: flag.to_owned(),
                seconds: self.timeout.as_secs(),
            });
        };

        let stdout = child
            .stdout
            .take()
            .map(std::io::read_to_string)
            .transpose()
            .map_err(io_error)?
            .unwrap_or_default();
        let stderr = child
            .stderr
            .take()
            .map(std::io::read_to_string)
            .transpose()
            .map_err(io_error)?
            .unwrap_or_default();

        if !status.success() {
            return Err(VerifyError::Failed {
                binary: name,
                flag: flag.to_owned(),
                status: status.to_string(),
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(stdout)
    }
}

/// Result of a completed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The output contained the expected string.
    Confirmed,
    /// The output did not match, and the policy downgraded it to a warning.
    Warned {
        /// The string the output had to contain.
        expected: String,
        /// The trimmed standard output.
        output: String,
    },
}

/// Runs the version smoke test against an installed binary.
pub struct Verifier<'a> {
    probe: &'a dyn VersionProbe,
    policy: VerifyPolicy,
}

impl<'a> Verifier<'a> {
    /// Create a verifier using `probe` and `policy`.
    #[must_use]
    pub fn new(probe: &'a dyn VersionProbe, policy: VerifyPolicy) -> Self {
        Self { probe, policy }
    }

    /// Check that `binary` reports `version` in the format `tool` declares.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Mismatch`] under [`VerifyPolicy::Fail`] when
    /// the output lacks the expected string, and any probe error when the
    /// binary cannot be queried. Under [`VerifyPolicy::Warn`] a mismatch is
    /// logged and returned as [`Verification::Warned`].
    pub fn verify(
        &self,
        binary: &Path,
        tool: &Tool,
        version: &Version,
    ) -> Result<Verification, VerifyError> {
        let expected = tool.expected_version_output(version);
        let output = self.probe.query(binary, tool.version_flag())?;
        let trimmed = output.trim();
        debug!("{} {} printed \"{trimmed}\"", binary.display(), tool.version_flag());

        if trimmed.contains(&expected) {
            return Ok(Verification::Confirmed);
        }

        match self.policy {
            VerifyPolicy::Fail => Err(VerifyError::Mismatch {
                expected,
                output: trimmed.to_owned(),
            }),
            VerifyPolicy::Warn => {
                warn!("version check failed: expected \"{expected}\", got \"{trimmed}\"");
                Ok(Verification::Warned {
                    expected,
                    output: trimmed.to_owned(),
                })
            }
        }
    }
}
