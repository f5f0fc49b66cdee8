//! Behaviour-driven tests for the install pipeline.
//!
//! These scenarios drive `run_install` end to end against a manifest whose
//! artefacts are local `file://` archives. Platform detection and the version
//! probe are fixed per scenario; download, checksum, extraction and the
//! atomic write are the real implementations.

use camino::Utf8PathBuf;
use release_installer::artefact::download::{ArtefactDownloader, DownloadError, HttpDownloader};
use release_installer::artefact::extraction::ArchiveExtractor;
use release_installer::artefact::fetch::CancelToken;
use release_installer::error::InstallerError;
use release_installer::manifest::{ManifestStore, parse_manifest};
use release_installer::pipeline::{
    InstallOutcome, InstallRequest, PipelineDeps, VerifyMode, run_install,
};
use release_installer::platform::{FixedDetector, detect_from};
use release_installer::test_utils::{
    ArtifactFixture, ReleaseFixture, manifest_json, sha256_hex, tar_gz_archive, version_script,
};
use release_installer::verify::{VerifyError, VerifyPolicy, VersionProbe};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

/// Answers the version flag with a fixed line instead of running the binary.
struct FixedProbe(String);

impl VersionProbe for FixedProbe {
    fn query(&self, _binary: &Path, _flag: &str) -> Result<String, VerifyError> {
        Ok(self.0.clone())
    }
}

/// Serves local archives and cancels the install after the first chunk.
struct CancellingDownloader {
    cancel: CancelToken,
    scratch_seen: Rc<RefCell<Vec<PathBuf>>>,
}

impl ArtefactDownloader for CancellingDownloader {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError> {
        let inner = HttpDownloader::default().open(url)?;
        Ok(Box::new(CancellingReader {
            inner,
            cancel: self.cancel.clone(),
            scratch_seen: Rc::clone(&self.scratch_seen),
        }))
    }
}

struct CancellingReader {
    inner: Box<dyn Read>,
    cancel: CancelToken,
    scratch_seen: Rc<RefCell<Vec<PathBuf>>>,
}

impl Read for CancellingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.scratch_seen
            .borrow_mut()
            .extend(self.cancel.scratch_paths());
        self.cancel.cancel();
        Ok(n)
    }
}

struct InstallWorld {
    root: TempDir,
    cancel: CancelToken,
    cancel_mid_download: bool,
    scratch_seen: Rc<RefCell<Vec<PathBuf>>>,
    archive_url: Option<String>,
    archive_sha: Option<String>,
    store: Option<ManifestStore>,
    detector: Option<FixedDetector>,
    reported: String,
    result: Option<Result<InstallOutcome, InstallerError>>,
}

impl InstallWorld {
    fn bin_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().join("bin")).expect("utf-8 temp path")
    }

    fn record_manifest(&mut self, sha256: &str) {
        let url = self.archive_url.clone().expect("archive written");
        let artifacts: Vec<_> = [
            ("macos", "arm64"),
            ("macos", "x64"),
            ("linux", "arm64"),
            ("linux", "x64"),
        ]
        .into_iter()
        .map(|(os, arch)| ArtifactFixture::new(os, arch, url.clone(), sha256))
        .collect();
        let json = manifest_json(
            "Stardust v{version}",
            &[
                ReleaseFixture::new("0.1.0", artifacts.clone()),
                ReleaseFixture::new("0.4.0", artifacts),
            ],
        );
        self.store = Some(parse_manifest(&json).expect("manifest parses"));
    }

    fn install(&mut self, version: Option<&str>, dry_run: bool) {
        let store = self.store.as_ref().expect("manifest recorded");
        let detector = self.detector.expect("platform set");
        let http = HttpDownloader::default();
        let cancelling = CancellingDownloader {
            cancel: self.cancel.clone(),
            scratch_seen: Rc::clone(&self.scratch_seen),
        };
        let downloader: &dyn ArtefactDownloader = if self.cancel_mid_download {
            &cancelling
        } else {
            &http
        };
        let extractor = ArchiveExtractor;
        let probe = FixedProbe(self.reported.clone());
        let deps = PipelineDeps {
            detector: &detector,
            downloader,
            extractor: &extractor,
            probe: &probe,
            cancel: self.cancel.clone(),
        };
        let bin_dir = self.bin_dir();
        let request = InstallRequest {
            version,
            bin_dir: &bin_dir,
            verify: VerifyMode::Check(VerifyPolicy::Fail),
            dry_run,
            quiet: true,
        };
        let mut stderr = Vec::new();
        self.result = Some(run_install(store, &request, &deps, &mut stderr));
    }

    fn outcome(&self) -> &InstallOutcome {
        match self.result.as_ref().expect("install ran") {
            Ok(outcome) => outcome,
            Err(err) => panic!("install failed: {err}"),
        }
    }

    fn error(&self) -> &InstallerError {
        match self.result.as_ref().expect("install ran") {
            Ok(outcome) => panic!("install unexpectedly succeeded: {outcome:?}"),
            Err(err) => err,
        }
    }
}

#[fixture]
fn world() -> InstallWorld {
    InstallWorld {
        root: tempfile::tempdir().expect("temp dir"),
        cancel: CancelToken::new(),
        cancel_mid_download: false,
        scratch_seen: Rc::new(RefCell::new(Vec::new())),
        archive_url: None,
        archive_sha: None,
        store: None,
        detector: None,
        reported: "Stardust v0.4.0".to_owned(),
        result: None,
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a release archive holding a stardust binary")]
fn given_release_archive(world: &mut InstallWorld) {
    let script = version_script("Stardust v0.4.0");
    let archive = tar_gz_archive(&[("stardust-0.4.0/stardust", script.as_slice())]);
    let path = world.root.path().join("stardust-release.tar.gz");
    std::fs::write(&path, &archive).expect("write archive");
    world.archive_url = Some(format!("file://{}", path.display()));
    world.archive_sha = Some(sha256_hex(&archive));
}

#[given("the manifest records the archive checksum")]
fn given_manifest_with_checksum(world: &mut InstallWorld) {
    let sha = world.archive_sha.clone().expect("archive written");
    world.record_manifest(&sha);
}

#[given("the manifest records a different checksum")]
fn given_manifest_with_wrong_checksum(world: &mut InstallWorld) {
    world.record_manifest(&sha256_hex(b"some other archive"));
}

#[given("the host platform is \"{os}\" on \"{arch}\"")]
fn given_host_platform(world: &mut InstallWorld, os: String, arch: String) {
    world.detector = Some(FixedDetector(
        detect_from(&os, &arch).expect("supported platform"),
    ));
}

#[given("the installed binary reports \"{output}\"")]
fn given_reported_version(world: &mut InstallWorld, output: String) {
    world.reported = output;
}

#[given("the download is cancelled after the first chunk")]
fn given_cancel_mid_download(world: &mut InstallWorld) {
    world.cancel_mid_download = true;
}

#[when("the latest version is installed")]
fn when_latest_installed(world: &mut InstallWorld) {
    world.install(None, false);
}

#[when("version \"{version}\" is installed")]
fn when_version_installed(world: &mut InstallWorld, version: String) {
    world.install(Some(&version), false);
}

#[when("the latest version is installed as a dry run")]
fn when_latest_installed_dry_run(world: &mut InstallWorld) {
    world.install(None, true);
}

#[then("the install reaches stage \"{stage}\"")]
fn then_reaches_stage(world: &mut InstallWorld, stage: String) {
    assert_eq!(world.outcome().final_stage().to_string(), stage);
}

#[then("the bin directory holds the stardust binary")]
fn then_binary_written(world: &mut InstallWorld) {
    let path = world.bin_dir().join("stardust");
    assert!(path.is_file(), "{path} should exist");
    assert_eq!(world.outcome().target, path);
}

#[then("the installed version is \"{version}\"")]
fn then_installed_version(world: &mut InstallWorld, version: String) {
    assert_eq!(world.outcome().version.to_string(), version);
}

#[then("the install fails at stage \"{stage}\" with exit code {code:i32}")]
fn then_fails_at_stage(world: &mut InstallWorld, stage: String, code: i32) {
    let err = world.error();
    assert_eq!(err.stage().map(|s| s.to_string()), Some(stage));
    assert_eq!(err.exit_code(), code);
}

#[then("the bin directory is empty")]
fn then_bin_dir_empty(world: &mut InstallWorld) {
    let bin_dir = world.bin_dir();
    let entries = std::fs::read_dir(&bin_dir)
        .map(|dir| {
            dir.filter_map(Result::ok)
                .filter(|entry| entry.file_name() != ".stardust.lock")
                .count()
        })
        .unwrap_or(0);
    assert_eq!(entries, 0, "{bin_dir} should hold no binary");
}

#[then("the partial download is discarded")]
fn then_partial_download_discarded(world: &mut InstallWorld) {
    let seen = world.scratch_seen.borrow();
    assert!(!seen.is_empty(), "download should have started");
    for path in seen.iter() {
        assert!(!path.exists(), "{} should be removed", path.display());
    }
    assert!(world.cancel.scratch_paths().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/install.feature",
    name = "Install the latest release on macOS arm64"
)]
fn scenario_install_latest(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Install an explicit older version"
)]
fn scenario_install_explicit_version(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Reject a download whose checksum differs"
)]
fn scenario_reject_checksum_mismatch(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Report a platform the manifest does not cover"
)]
fn scenario_report_uncovered_platform(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Fail when the binary reports another version"
)]
fn scenario_fail_on_version_mismatch(world: InstallWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/install.feature", name = "Dry run writes nothing")]
fn scenario_dry_run(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Cancelling mid-download discards the partial file"
)]
fn scenario_cancel_mid_download(world: InstallWorld) {
    assert!(world.cancel.is_cancelled());
}
