//! CLI argument definitions for the release installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::Overrides;
use crate::verify::VerifyPolicy;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Install prebuilt release binaries described by a manifest.
#[derive(Parser, Debug)]
#[command(name = "release-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install prebuilt release binaries described by a manifest.\n\n",
    "The manifest lists each release of a tool with one download URL and ",
    "SHA-256 checksum per operating system and architecture. The installer ",
    "selects the entry for this machine, downloads and verifies it, extracts ",
    "the executable, writes it atomically into the bin directory, and runs ",
    "it with its version flag to confirm the install.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install the latest release:\n",
    "    $ release-installer --manifest stardust.json install\n\n",
    "  Install a specific version into /usr/local/bin:\n",
    "    $ release-installer -m stardust.json install 0.1.0 --bin-dir /usr/local/bin\n\n",
    "  Show what would be installed:\n",
    "    $ release-installer -m stardust.json install --dry-run\n\n",
    "  List releases:\n",
    "    $ release-installer -m stardust.json list\n\n",
    "  Verify every artifact of a release:\n",
    "    $ release-installer -m stardust.json check-release 0.4.0\n\n",
    "ENVIRONMENT:\n",
    "  RELEASE_INSTALLER_MANIFEST    Manifest file when --manifest is not given\n",
    "  RELEASE_INSTALLER_BIN_DIR     Install directory when --bin-dir is not given\n",
    "  RUST_LOG                      Log filter, overriding -v",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Manifest file describing the releases.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Configuration file [default: config.toml in the user config dir].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install a release for this machine.
    Install(InstallArgs),

    /// List releases and the platforms they support.
    List(ListArgs),

    /// Download and verify every artifact of one release.
    CheckRelease(CheckReleaseArgs),
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Version to install [default: latest].
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Directory to install into [default: ~/.local/bin].
    #[arg(short, long, value_name = "DIR")]
    pub bin_dir: Option<Utf8PathBuf>,

    /// Override the detected operating system (macos, linux, windows).
    #[arg(long, value_name = "OS")]
    pub os: Option<String>,

    /// Override the detected architecture (arm64, x64).
    #[arg(long, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Download timeout in seconds [default: 300].
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// What to do when the installed binary reports another version.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub verify_policy: Option<VerifyPolicy>,

    /// Do not run the installed binary after writing it.
    #[arg(long, conflicts_with = "verify_policy")]
    pub skip_verify: bool,

    /// Resolve the artifact and print the plan without downloading.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the check-release command.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckReleaseArgs {
    /// Version whose artifacts are checked.
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Download timeout in seconds [default: 300].
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Collect the configuration values given on the command line.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use release_installer::cli::Cli;
    ///
    /// let cli = Cli::parse_from([
    ///     "release-installer", "--manifest", "stardust.json",
    ///     "install", "--bin-dir", "/opt/bin",
    /// ]);
    /// let overrides = cli.overrides();
    /// assert_eq!(overrides.manifest.as_deref().map(|p| p.as_str()), Some("stardust.json"));
    /// assert_eq!(overrides.bin_dir.as_deref().map(|p| p.as_str()), Some("/opt/bin"));
    /// ```
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            config: self.config.clone(),
            manifest: self.manifest.clone(),
            ..Overrides::default()
        };
        match &self.command {
            Command::Install(args) => {
                overrides.bin_dir.clone_from(&args.bin_dir);
                overrides.timeout_secs = args.timeout;
                overrides.verify_policy = args.verify_policy;
            }
            Command::CheckRelease(args) => overrides.timeout_secs = args.timeout,
            Command::List(_) => {}
        }
        overrides
    }

    /// Return the default log filter implied by `-v`/`-q`.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
