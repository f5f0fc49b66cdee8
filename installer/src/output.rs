//! Output formatting for the installer CLI.
//!
//! Progress and result messages go to stderr; machine-readable listings go
//! to stdout through [`crate::list_output`].

use crate::manifest::ArtifactEntry;
use crate::platform::Platform;
use camino::Utf8Path;
use semver::Version;
use std::io::Write;

/// Write `message` and a newline to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format a success message after installation.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use release_installer::output::success_message;
/// use semver::Version;
///
/// let msg = success_message("stardust", &Version::new(0, 4, 0), Utf8Path::new("/usr/local/bin/stardust"));
/// assert_eq!(msg, "Installed stardust 0.4.0 to /usr/local/bin/stardust");
/// ```
#[must_use]
pub fn success_message(tool: &str, version: &Version, path: &Utf8Path) -> String {
    format!("Installed {tool} {version} to {path}")
}

/// Resolved install plan printed by `--dry-run`.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use release_installer::manifest::parse_manifest;
/// use release_installer::output::DryRunInfo;
/// use release_installer::platform::{Arch, Os, Platform};
///
/// let json = r#"{
///   "name": "stardust",
///   "releases": [{
///     "version": "0.4.0", "license": "MIT", "description": "docs",
///     "artifacts": [{
///       "os": "linux", "arch": "x64",
///       "url": "https://example.test/stardust-linux-x64.tar.gz",
///       "sha256": "0000000000000000000000000000000000000000000000000000000000000000"
///     }]
///   }]
/// }"#;
/// let store = parse_manifest(json).expect("valid manifest");
/// let release = store.latest().expect("has releases");
/// let platform = Platform::new(Os::Linux, Arch::X64);
///
/// let info = DryRunInfo {
///     tool: store.tool().name(),
///     version: release.version(),
///     platform,
///     entry: release.artifact(platform).expect("artifact present"),
///     target: Utf8Path::new("/home/user/.local/bin/stardust"),
///     verify: true,
/// };
///
/// let output = info.display_text();
/// assert!(output.contains("Dry run"));
/// assert!(output.contains("stardust-linux-x64.tar.gz"));
/// ```
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Tool name.
    pub tool: &'a str,
    /// Release that would be installed.
    pub version: &'a Version,
    /// Platform the artefact was selected for.
    pub platform: Platform,
    /// Selected manifest entry.
    pub entry: &'a ArtifactEntry,
    /// Path the binary would be written to.
    pub target: &'a Utf8Path,
    /// Whether the version smoke test would run.
    pub verify: bool,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        [
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Tool: {}", self.tool),
            format!("Version: {}", self.version),
            format!("Platform: {}", self.platform),
            format!("URL: {}", self.entry.url()),
            format!("SHA-256: {}", self.entry.checksum()),
            format!("Target: {}", self.target),
            format!("Verify version: {}", self.verify),
        ]
        .join("\n")
    }
}
