//! Unit tests for the install pipeline.
//!
//! Collaborators are mocked at the platform, transport and process seams;
//! archive extraction and file writes run for real inside a temp directory.

use super::*;
use crate::artefact::download::{DownloadError, MockArtefactDownloader};
use crate::artefact::extraction::ArchiveExtractor;
use crate::manifest::parse_manifest;
use crate::platform::{Arch, MockPlatformDetector, Os, UnsupportedPlatform};
use crate::test_utils::{sha256_hex, stardust_manifest_json, tar_gz_archive, version_script};
use crate::verify::MockVersionProbe;
use rstest::{fixture, rstest};
use std::io::Cursor;
use tempfile::TempDir;

struct Harness {
    archive: Vec<u8>,
    store: ManifestStore,
    bin_dir: Utf8PathBuf,
    _root: TempDir,
}

impl Harness {
    fn with_manifest_checksum(archive: Vec<u8>, checksum: &str) -> Self {
        let root = tempfile::tempdir().expect("temp dir");
        let bin_dir = Utf8PathBuf::from_path_buf(root.path().join("bin")).expect("utf-8 path");
        let store = parse_manifest(&stardust_manifest_json(checksum)).expect("valid manifest");
        Self {
            archive,
            store,
            bin_dir,
            _root: root,
        }
    }

    fn request(&self) -> InstallRequest<'_> {
        InstallRequest {
            version: None,
            bin_dir: &self.bin_dir,
            verify: VerifyMode::Check(VerifyPolicy::Fail),
            dry_run: false,
            quiet: false,
        }
    }

    fn installed_path(&self) -> Utf8PathBuf {
        self.bin_dir.join("stardust")
    }

    fn serving_downloader(&self) -> MockArtefactDownloader {
        let bytes = self.archive.clone();
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_open()
            .times(1)
            .returning(move |_| Ok(Box::new(Cursor::new(bytes.clone()))));
        downloader
    }
}

fn stardust_archive() -> Vec<u8> {
    let script = version_script("Stardust v0.4.0");
    tar_gz_archive(&[("stardust", script.as_slice())])
}

#[fixture]
fn harness() -> Harness {
    let archive = stardust_archive();
    let checksum = sha256_hex(&archive);
    Harness::with_manifest_checksum(archive, &checksum)
}

fn detector_for(os: Os, arch: Arch) -> MockPlatformDetector {
    let mut detector = MockPlatformDetector::new();
    detector
        .expect_detect()
        .returning(move || Ok(Platform::new(os, arch)));
    detector
}

fn probe_printing(output: &'static str) -> MockVersionProbe {
    let mut probe = MockVersionProbe::new();
    probe
        .expect_query()
        .returning(move |_, _| Ok(output.to_owned()));
    probe
}

fn silent_probe() -> MockVersionProbe {
    let mut probe = MockVersionProbe::new();
    probe.expect_query().never();
    probe
}

fn idle_downloader() -> MockArtefactDownloader {
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_open().never();
    downloader
}

fn deps<'a>(
    detector: &'a MockPlatformDetector,
    downloader: &'a MockArtefactDownloader,
    probe: &'a MockVersionProbe,
) -> PipelineDeps<'a> {
    PipelineDeps {
        detector,
        downloader,
        extractor: &ArchiveExtractor,
        probe,
        cancel: CancelToken::new(),
    }
}

#[rstest]
fn macos_arm64_install_reaches_done(harness: Harness) {
    let detector = detector_for(Os::Macos, Arch::Arm64);
    let bytes = harness.archive.clone();
    let mut downloader = MockArtefactDownloader::new();
    downloader
        .expect_open()
        .withf(|url| url.ends_with("/v0.4.0/stardust-darwin-arm64.tar.gz"))
        .times(1)
        .returning(move |_| Ok(Box::new(Cursor::new(bytes.clone()))));
    let probe = probe_printing("Stardust v0.4.0\n");
    let mut stderr = Vec::new();

    let outcome = run_install(
        &harness.store,
        &harness.request(),
        &deps(&detector, &downloader, &probe),
        &mut stderr,
    )
    .expect("install succeeds");

    assert_eq!(
        outcome.trace,
        vec![
            Stage::Pending,
            Stage::Detecting,
            Stage::Fetching,
            Stage::VerifyingChecksum,
            Stage::Extracting,
            Stage::Writing,
            Stage::VerifyingVersion,
            Stage::Done,
        ]
    );
    assert!(outcome.installed());
    assert_eq!(outcome.version, Version::new(0, 4, 0));
    assert_eq!(outcome.verification, Some(Verification::Confirmed));
    assert_eq!(
        std::fs::read(harness.installed_path()).expect("binary written"),
        version_script("Stardust v0.4.0")
    );
    let text = String::from_utf8(stderr).expect("utf-8 stderr");
    assert!(text.contains("Installed stardust 0.4.0"));
}

#[test]
fn checksum_mismatch_fails_before_writing() {
    let harness = Harness::with_manifest_checksum(stardust_archive(), &sha256_hex(b"other bytes"));
    let detector = detector_for(Os::Macos, Arch::Arm64);
    let downloader = harness.serving_downloader();
    let probe = silent_probe();

    let err = run_install(
        &harness.store,
        &harness.request(),
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    )
    .expect_err("checksum must not match");

    assert_eq!(err.stage(), Some(Stage::VerifyingChecksum));
    assert!(matches!(err.root(), InstallerError::ChecksumMismatch { .. }));
    assert_eq!(err.exit_code(), 5);
    assert!(!harness.installed_path().exists());
}

#[rstest]
fn unsupported_windows_entry_fails_before_download(harness: Harness) {
    let detector = detector_for(Os::Windows, Arch::X64);
    let downloader = idle_downloader();
    let probe = silent_probe();

    let err = run_install(
        &harness.store,
        &harness.request(),
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    )
    .expect_err("no windows artefact");

    assert_eq!(err.stage(), Some(Stage::Detecting));
    assert!(matches!(
        err.root(),
        InstallerError::NotFound(LookupError::NoArtifact { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
fn unsupported_host_maps_to_exit_three(harness: Harness) {
    let mut detector = MockPlatformDetector::new();
    detector.expect_detect().returning(|| {
        Err(UnsupportedPlatform::Arch {
            value: "riscv64".to_owned(),
        })
    });
    let downloader = idle_downloader();
    let probe = silent_probe();

    let err = run_install(
        &harness.store,
        &harness.request(),
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    )
    .expect_err("riscv64 unsupported");

    assert_eq!(err.exit_code(), 3);
}

#[rstest]
fn unknown_version_is_not_found(harness: Harness) {
    let detector = detector_for(Os::Linux, Arch::X64);
    let downloader = idle_downloader();
    let probe = silent_probe();
    let request = InstallRequest {
        version: Some("9.9.9"),
        ..harness.request()
    };

    let err = run_install(
        &harness.store,
        &request,
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    )
    .expect_err("unpublished version");

    assert!(matches!(
        err.root(),
        InstallerError::NotFound(LookupError::UnknownVersion { .. })
    ));
}

#[rstest]
fn dry_run_stops_after_lookup(harness: Harness) {
    let detector = detector_for(Os::Linux, Arch::Arm64);
    let downloader = idle_downloader();
    let probe = silent_probe();
    let request = InstallRequest {
        version: Some("v0.1.0"),
        dry_run: true,
        ..harness.request()
    };
    let mut stderr = Vec::new();

    let outcome = run_install(
        &harness.store,
        &request,
        &deps(&detector, &downloader, &probe),
        &mut stderr,
    )
    .expect("dry run succeeds");

    assert_eq!(outcome.final_stage(), Stage::Detecting);
    assert!(!outcome.installed());
    assert!(outcome.entry.url().ends_with("/v0.1.0/stardust-linux-arm64.tar.gz"));
    assert!(!harness.installed_path().exists());
    let text = String::from_utf8(stderr).expect("utf-8 stderr");
    assert!(text.contains("Dry run"));
}

#[rstest]
#[case::fail(VerifyPolicy::Fail, true)]
#[case::warn(VerifyPolicy::Warn, false)]
fn version_mismatch_follows_policy(
    harness: Harness,
    #[case] policy: VerifyPolicy,
    #[case] should_fail: bool,
) {
    let detector = detector_for(Os::Linux, Arch::X64);
    let downloader = harness.serving_downloader();
    let probe = probe_printing("Stardust v0.1.0");
    let request = InstallRequest {
        verify: VerifyMode::Check(policy),
        ..harness.request()
    };

    let result = run_install(
        &harness.store,
        &request,
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    );

    if should_fail {
        let err = result.expect_err("mismatch fails");
        assert_eq!(err.stage(), Some(Stage::VerifyingVersion));
        assert_eq!(err.exit_code(), 8);
    } else {
        let outcome = result.expect("mismatch tolerated");
        assert!(matches!(
            outcome.verification,
            Some(Verification::Warned { .. })
        ));
    }
}

#[rstest]
fn skip_verify_never_runs_binary(harness: Harness) {
    let detector = detector_for(Os::Linux, Arch::X64);
    let downloader = harness.serving_downloader();
    let probe = silent_probe();
    let request = InstallRequest {
        verify: VerifyMode::Skip,
        quiet: true,
        ..harness.request()
    };
    let mut stderr = Vec::new();

    let outcome = run_install(
        &harness.store,
        &request,
        &deps(&detector, &downloader, &probe),
        &mut stderr,
    )
    .expect("install succeeds");

    assert_eq!(outcome.verification, None);
    assert!(!outcome.trace.contains(&Stage::VerifyingVersion));
    assert!(outcome.installed());
    assert!(stderr.is_empty(), "quiet run prints nothing");
}

#[rstest]
fn download_failure_reports_fetching_stage(harness: Harness) {
    let detector = detector_for(Os::Linux, Arch::X64);
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_open().returning(|url| {
        Err(DownloadError::NotFound {
            url: url.to_owned(),
        })
    });
    let probe = silent_probe();

    let err = run_install(
        &harness.store,
        &harness.request(),
        &deps(&detector, &downloader, &probe),
        &mut Vec::new(),
    )
    .expect_err("404");

    assert_eq!(err.stage(), Some(Stage::Fetching));
    assert_eq!(err.exit_code(), 4);
    assert!(err.to_string().starts_with("fetching failed"));
}

#[rstest]
fn cancelled_install_downloads_nothing(harness: Harness) {
    let detector = detector_for(Os::Linux, Arch::X64);
    let downloader = idle_downloader();
    let probe = silent_probe();
    let cancel = CancelToken::new();
    cancel.cancel();
    let pipeline_deps = PipelineDeps {
        cancel,
        ..deps(&detector, &downloader, &probe)
    };

    let err = run_install(
        &harness.store,
        &harness.request(),
        &pipeline_deps,
        &mut Vec::new(),
    )
    .expect_err("cancelled");

    assert_eq!(err.stage(), Some(Stage::Fetching));
    assert!(!harness.installed_path().exists());
}

#[test]
fn stage_display_is_lowercase_words() {
    assert_eq!(Stage::VerifyingChecksum.to_string(), "verifying checksum");
    assert_eq!(Stage::Done.to_string(), "done");
}
