//! Host platform model and detection.
//!
//! Artefacts are keyed by an explicit `(Os, Arch)` pair rather than nested
//! conditionals. The [`PlatformDetector`] trait maps the running environment
//! onto that pair; [`HostDetector`] reads it from the compiled target and
//! [`FixedDetector`] reports a caller-chosen pair for overrides and tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system family of a release artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Apple macOS.
    #[serde(alias = "darwin", alias = "osx")]
    Macos,
    /// Linux distributions.
    Linux,
    /// Microsoft Windows. Detectable, though most manifests carry no entry.
    Windows,
}

impl Os {
    /// Return the canonical lowercase name used in manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = UnsupportedPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(UnsupportedPlatform::Os {
                value: value.to_owned(),
            }),
        }
    }
}

/// CPU architecture of a release artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, Graviton).
    #[serde(alias = "aarch64")]
    Arm64,
    /// 64-bit Intel/AMD.
    #[serde(alias = "x86_64", alias = "amd64")]
    X64,
}

impl Arch {
    /// Return the canonical lowercase name used in manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X64 => "x64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = UnsupportedPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            _ => Err(UnsupportedPlatform::Arch {
                value: value.to_owned(),
            }),
        }
    }
}

/// An `(os, arch)` pair identifying one artefact slot in a release.
///
/// # Examples
///
/// ```
/// use release_installer::platform::{Arch, Os, Platform};
///
/// let platform = Platform::new(Os::Macos, Arch::Arm64);
/// assert_eq!(platform.to_string(), "macos-arm64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Construct a platform from its parts.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// The running environment is outside the supported OS/arch matrix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedPlatform {
    /// The operating system is not macOS, Linux or Windows.
    #[error("unsupported operating system \"{value}\"; expected one of: macos, linux, windows")]
    Os {
        /// The rejected OS identifier.
        value: String,
    },

    /// The CPU architecture is not arm64 or x64.
    #[error("unsupported architecture \"{value}\"; expected one of: arm64, x64")]
    Arch {
        /// The rejected architecture identifier.
        value: String,
    },
}

/// Source of the `(os, arch)` pair used to select a manifest entry.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformDetector {
    /// Report the platform to install for.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedPlatform`] when the environment is outside the
    /// supported matrix.
    fn detect(&self) -> Result<Platform, UnsupportedPlatform>;
}

/// Detects the platform the installer binary was compiled for.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDetector;

impl PlatformDetector for HostDetector {
    fn detect(&self) -> Result<Platform, UnsupportedPlatform> {
        detect_from(std::env::consts::OS, std::env::consts::ARCH)
    }
}

/// Reports a fixed platform, used for `--os`/`--arch` overrides.
#[derive(Debug, Clone, Copy)]
pub struct FixedDetector(pub Platform);

impl PlatformDetector for FixedDetector {
    fn detect(&self) -> Result<Platform, UnsupportedPlatform> {
        Ok(self.0)
    }
}

/// Map Rust's `std::env::consts` identifiers onto a [`Platform`].
///
/// # Errors
///
/// Returns [`UnsupportedPlatform`] for any OS or architecture outside the
/// supported matrix.
///
/// # Examples
///
/// ```
/// use release_installer::platform::{Arch, Os, detect_from};
///
/// let platform = detect_from("macos", "aarch64").expect("supported");
/// assert_eq!(platform.os, Os::Macos);
/// assert_eq!(platform.arch, Arch::Arm64);
/// assert!(detect_from("freebsd", "x86_64").is_err());
/// ```
pub fn detect_from(os: &str, arch: &str) -> Result<Platform, UnsupportedPlatform> {
    Ok(Platform::new(os.parse()?, arch.parse()?))
}

/// Combine optional `--os`/`--arch` overrides with the host platform.
///
/// When both overrides are present the host is never queried, so an
/// explicit pair works even on an unsupported host.
///
/// # Errors
///
/// Returns [`UnsupportedPlatform`] when an override fails to parse or when
/// host detection is needed and fails.
pub fn resolve_detector(
    os: Option<&str>,
    arch: Option<&str>,
) -> Result<Box<dyn PlatformDetector>, UnsupportedPlatform> {
    match (os, arch) {
        (None, None) => Ok(Box::new(HostDetector)),
        (Some(os_value), Some(arch_value)) => Ok(Box::new(FixedDetector(detect_from(
            os_value, arch_value,
        )?))),
        (os_value, arch_value) => {
            let host = HostDetector.detect()?;
            let os_parsed = os_value.map_or(Ok(host.os), str::parse)?;
            let arch_parsed = arch_value.map_or(Ok(host.arch), str::parse)?;
            Ok(Box::new(FixedDetector(Platform::new(os_parsed, arch_parsed))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::macos("macos", Os::Macos)]
    #[case::darwin("darwin", Os::Macos)]
    #[case::linux("linux", Os::Linux)]
    #[case::windows("windows", Os::Windows)]
    #[case::mixed_case("Linux", Os::Linux)]
    fn parses_os_aliases(#[case] input: &str, #[case] expected: Os) {
        assert_eq!(input.parse::<Os>().expect("supported os"), expected);
    }

    #[rstest]
    #[case::arm64("arm64", Arch::Arm64)]
    #[case::aarch64("aarch64", Arch::Arm64)]
    #[case::x64("x64", Arch::X64)]
    #[case::x86_64("x86_64", Arch::X64)]
    #[case::amd64("amd64", Arch::X64)]
    fn parses_arch_aliases(#[case] input: &str, #[case] expected: Arch) {
        assert_eq!(input.parse::<Arch>().expect("supported arch"), expected);
    }

    #[rstest]
    #[case::freebsd("freebsd", "x86_64")]
    #[case::riscv("linux", "riscv64")]
    #[case::x86("linux", "x86")]
    fn rejects_unsupported_environments(#[case] os: &str, #[case] arch: &str) {
        assert!(detect_from(os, arch).is_err());
    }

    #[test]
    fn unsupported_arch_names_the_value() {
        let err = detect_from("linux", "riscv64").expect_err("riscv64 is unsupported");
        assert!(err.to_string().contains("riscv64"));
    }

    #[test]
    fn host_detector_matches_compiled_target() {
        let result = HostDetector.detect();

        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(result, Ok(Platform::new(Os::Linux, Arch::X64)));

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert_eq!(result, Ok(Platform::new(Os::Macos, Arch::Arm64)));

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        assert!(result.is_err());
    }

    #[test]
    fn full_override_skips_host_detection() {
        let detector = resolve_detector(Some("windows"), Some("x64")).expect("valid override");
        assert_eq!(
            detector.detect(),
            Ok(Platform::new(Os::Windows, Arch::X64))
        );
    }

    #[test]
    fn invalid_override_is_rejected() {
        assert!(resolve_detector(Some("plan9"), Some("x64")).is_err());
    }

    #[test]
    fn platform_display_joins_os_and_arch() {
        let platform = Platform::new(Os::Linux, Arch::Arm64);
        assert_eq!(platform.to_string(), "linux-arm64");
    }

    #[test]
    fn serde_accepts_aliases() {
        let os: Os = serde_json::from_str("\"darwin\"").expect("alias");
        let arch: Arch = serde_json::from_str("\"aarch64\"").expect("alias");
        assert_eq!(os, Os::Macos);
        assert_eq!(arch, Arch::Arm64);
    }
}
