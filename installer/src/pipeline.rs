//! Install pipeline orchestration.
//!
//! Drives one install through an explicit state machine:
//! `Pending -> Detecting -> Fetching -> VerifyingChecksum -> Extracting ->
//! Writing -> VerifyingVersion -> Done`. Any failure is terminal and is
//! reported together with the stage that was running. There are no retries.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::{ArchiveFormat, ArtefactExtractor};
use crate::artefact::fetch::{CancelToken, Fetcher};
use crate::error::{InstallerError, Result};
use crate::install::{InstallTarget, Installer};
use crate::manifest::{ArtifactEntry, LookupError, ManifestStore};
use crate::output::{DryRunInfo, success_message, write_stderr_line};
use crate::platform::{Platform, PlatformDetector};
use crate::verify::{Verification, Verifier, VerifyPolicy, VersionProbe};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use semver::Version;
use std::fmt;
use std::io::Write;

/// A step of the install state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing has run yet.
    Pending,
    /// Detecting the platform and looking up the manifest entry.
    Detecting,
    /// Downloading the artefact.
    Fetching,
    /// Comparing the download against the manifest checksum.
    VerifyingChecksum,
    /// Unpacking the archive and locating the executable.
    Extracting,
    /// Writing the executable into the target directory.
    Writing,
    /// Running the installed binary's version check.
    VerifyingVersion,
    /// The install completed.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Detecting => "detecting",
            Self::Fetching => "fetching",
            Self::VerifyingChecksum => "verifying checksum",
            Self::Extracting => "extracting",
            Self::Writing => "writing",
            Self::VerifyingVersion => "verifying version",
            Self::Done => "done",
        })
    }
}

/// Whether and how the installed binary is smoke-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Do not run the binary.
    Skip,
    /// Run the binary and apply the policy to a mismatch.
    Check(VerifyPolicy),
}

/// Parameters of one install run.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Version to install; the latest release when `None`.
    pub version: Option<&'a str>,
    /// Directory the binary is written into.
    pub bin_dir: &'a Utf8Path,
    /// Post-install verification mode.
    pub verify: VerifyMode,
    /// Stop after lookup and print the plan.
    pub dry_run: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Collaborators the pipeline drives, injected for testing.
pub struct PipelineDeps<'a> {
    /// Source of the `(os, arch)` pair.
    pub detector: &'a dyn PlatformDetector,
    /// Transport for artefact bytes.
    pub downloader: &'a dyn ArtefactDownloader,
    /// Archive unpacker.
    pub extractor: &'a dyn ArtefactExtractor,
    /// Runner for the installed binary.
    pub probe: &'a dyn VersionProbe,
    /// Cancellation flag observed while fetching.
    pub cancel: CancelToken,
}

/// What a completed pipeline run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// The release that was selected.
    pub version: Version,
    /// The platform the artefact was selected for.
    pub platform: Platform,
    /// The selected manifest entry.
    pub entry: ArtifactEntry,
    /// Where the binary was (or, in a dry run, would be) written.
    pub target: Utf8PathBuf,
    /// Result of the version check, when it ran.
    pub verification: Option<Verification>,
    /// Stages entered, in order, ending with the final stage.
    pub trace: Vec<Stage>,
}

impl InstallOutcome {
    /// Return the final stage reached.
    #[must_use]
    pub fn final_stage(&self) -> Stage {
        self.trace.last().copied().unwrap_or(Stage::Pending)
    }

    /// Return true when the binary was written.
    #[must_use]
    pub fn installed(&self) -> bool {
        self.final_stage() == Stage::Done
    }
}

struct Run {
    trace: Vec<Stage>,
}

impl Run {
    fn new() -> Self {
        Self {
            trace: vec![Stage::Pending],
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("entering stage: {stage}");
        self.trace.push(stage);
    }

    fn current(&self) -> Stage {
        self.trace.last().copied().unwrap_or(Stage::Pending)
    }

    fn step<T, E>(&self, result: std::result::Result<T, E>) -> Result<T>
    where
        E: Into<InstallerError>,
    {
        result.map_err(|err| err.into().at(self.current()))
    }
}

/// Install a release from `store` according to `request`.
///
/// Progress lines go to `stderr` unless the request is quiet.
///
/// # Errors
///
/// Returns an [`InstallerError::StageFailed`] naming the stage that failed
/// and wrapping the category of the failure. Nothing is written to the
/// target directory unless the checksum matched.
pub fn run_install(
    store: &ManifestStore,
    request: &InstallRequest<'_>,
    deps: &PipelineDeps<'_>,
    stderr: &mut dyn Write,
) -> Result<InstallOutcome> {
    let mut run = Run::new();
    let tool = store.tool();

    run.enter(Stage::Detecting);
    let platform = run.step(deps.detector.detect())?;
    let release = run.step(store.resolve(request.version))?;
    let entry = run.step(release.artifact(platform).ok_or_else(|| LookupError::NoArtifact {
        version: release.version().to_string(),
        platform,
    }))?;
    let target = InstallTarget::new(request.bin_dir.to_owned(), tool.binary());
    info!(
        "selected {} {} for {platform}: {}",
        tool.name(),
        release.version(),
        entry.url()
    );

    if request.dry_run {
        let plan = DryRunInfo {
            tool: tool.name(),
            version: release.version(),
            platform,
            entry,
            target: &target.path(),
            verify: request.verify != VerifyMode::Skip,
        };
        write_stderr_line(stderr, plan.display_text());
        return Ok(outcome(release.version(), platform, entry, &target, None, run));
    }

    if !request.quiet {
        write_stderr_line(
            stderr,
            format!(
                "Installing {} {} for {platform}...",
                tool.name(),
                release.version()
            ),
        );
    }

    run.enter(Stage::Fetching);
    let fetcher = Fetcher::new(deps.downloader, deps.cancel.clone());
    let downloaded = run.step(fetcher.download(entry))?;

    run.enter(Stage::VerifyingChecksum);
    let verified = run.step(downloaded.verify(entry.checksum()))?;

    run.enter(Stage::Extracting);
    let installer = Installer::new(deps.extractor);
    let payload = run.step(installer.extract_payload(
        verified.path(),
        ArchiveFormat::from_url(entry.url()),
        tool.binary(),
    ))?;

    run.enter(Stage::Writing);
    let installed = run.step(installer.write(&payload, &target))?;
    drop(payload);
    drop(verified);

    let verification = match request.verify {
        VerifyMode::Skip => None,
        VerifyMode::Check(policy) => {
            run.enter(Stage::VerifyingVersion);
            let verifier = Verifier::new(deps.probe, policy);
            Some(run.step(verifier.verify(installed.as_std_path(), tool, release.version()))?)
        }
    };

    run.enter(Stage::Done);
    if !request.quiet {
        write_stderr_line(
            stderr,
            success_message(tool.name(), release.version(), &installed),
        );
    }
    Ok(outcome(
        release.version(),
        platform,
        entry,
        &target,
        verification,
        run,
    ))
}

fn outcome(
    version: &Version,
    platform: Platform,
    entry: &ArtifactEntry,
    target: &InstallTarget,
    verification: Option<Verification>,
    run: Run,
) -> InstallOutcome {
    InstallOutcome {
        version: version.clone(),
        platform,
        entry: entry.clone(),
        target: target.path(),
        verification,
        trace: run.trace,
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
