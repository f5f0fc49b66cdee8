//! Unit tests for manifest parsing and validation.

use super::*;
use crate::test_utils::{
    ArtifactFixture, ReleaseFixture, manifest_json, stardust_artifacts, stardust_manifest_json,
};
use rstest::rstest;

fn valid_sha() -> String {
    "a".repeat(64)
}

#[test]
fn parses_stardust_manifest() {
    let store = parse_manifest(&stardust_manifest_json(&valid_sha())).expect("valid");
    assert_eq!(store.tool().name(), "stardust");
    assert_eq!(store.tool().binary(), "stardust");
    assert_eq!(store.tool().version_flag(), "--version");
    assert_eq!(store.releases().count(), 2);
    for release in store.releases() {
        assert_eq!(release.platforms().len(), 4);
        assert_eq!(release.license(), "MIT");
    }
}

#[test]
fn expands_version_in_urls() {
    let store = parse_manifest(&stardust_manifest_json(&valid_sha())).expect("valid");
    let release = store.release("0.4.0").expect("published");
    let entry = release
        .artifact(Platform::new(Os::Macos, Arch::Arm64))
        .expect("macos arm64 entry");
    assert_eq!(
        entry.url(),
        "https://github.com/nexlabstudio/stardust/releases/download/v0.4.0/stardust-darwin-arm64.tar.gz"
    );
}

#[test]
fn binary_defaults_to_tool_name() {
    let json = r#"{"name":"stardust","releases":[]}"#;
    let store = parse_manifest(json).expect("valid");
    assert_eq!(store.tool().binary(), "stardust");
    assert_eq!(store.releases().count(), 0);
}

#[test]
fn rejects_invalid_json_syntax() {
    let err = parse_manifest("{not valid json").expect_err("malformed");
    assert!(matches!(err, ManifestError::Parse { .. }));
}

#[test]
fn rejects_unknown_fields() {
    let err = parse_manifest(r#"{"name":"stardust","bottle":true}"#).expect_err("unknown field");
    assert!(matches!(err, ManifestError::Parse { .. }));
}

#[test]
fn rejects_empty_name() {
    let err = parse_manifest(r#"{"name":"  ","releases":[]}"#).expect_err("empty name");
    assert_eq!(err, ManifestError::EmptyField { field: "name" });
}

#[rstest]
#[case::placeholder("PLACEHOLDER")]
#[case::too_long(&"b".repeat(96))]
#[case::non_hex(&"z".repeat(64))]
fn rejects_malformed_checksums(#[case] sha: &str) {
    let err = parse_manifest(&stardust_manifest_json(sha)).expect_err("bad checksum");
    match err {
        ManifestError::InvalidChecksum {
            version, platform, ..
        } => {
            assert_eq!(version, "0.1.0");
            assert_eq!(platform, Platform::new(Os::Macos, Arch::Arm64));
        }
        other => panic!("expected InvalidChecksum, got {other:?}"),
    }
}

#[test]
fn rejects_duplicate_release_versions() {
    let json = manifest_json(
        "{version}",
        &[
            ReleaseFixture::new("0.1.0", stardust_artifacts(&valid_sha())),
            ReleaseFixture::new("v0.1.0", stardust_artifacts(&valid_sha())),
        ],
    );
    let err = parse_manifest(&json).expect_err("duplicate");
    assert_eq!(
        err,
        ManifestError::DuplicateRelease {
            version: "0.1.0".to_owned()
        }
    );
}

#[test]
fn rejects_duplicate_platform_within_release() {
    let mut artifacts = stardust_artifacts(&valid_sha());
    artifacts.push(ArtifactFixture::new(
        "darwin",
        "aarch64",
        "https://example.test/again.tar.gz",
        valid_sha(),
    ));
    let json = manifest_json("{version}", &[ReleaseFixture::new("0.1.0", artifacts)]);
    let err = parse_manifest(&json).expect_err("duplicate platform");
    assert!(matches!(err, ManifestError::DuplicateArtifact { .. }));
}

#[test]
fn rejects_release_without_artifacts() {
    let json = manifest_json("{version}", &[ReleaseFixture::new("0.1.0", Vec::new())]);
    let err = parse_manifest(&json).expect_err("empty release");
    assert!(matches!(err, ManifestError::EmptyRelease { .. }));
}

#[test]
fn rejects_non_semver_version() {
    let json = manifest_json(
        "{version}",
        &[ReleaseFixture::new("latest", stardust_artifacts(&valid_sha()))],
    );
    let err = parse_manifest(&json).expect_err("bad version");
    assert!(matches!(err, ManifestError::InvalidVersion { .. }));
}

#[test]
fn rejects_unknown_os() {
    let artifacts = vec![ArtifactFixture::new(
        "plan9",
        "x64",
        "https://example.test/a.tar.gz",
        valid_sha(),
    )];
    let json = manifest_json("{version}", &[ReleaseFixture::new("0.1.0", artifacts)]);
    assert!(matches!(
        parse_manifest(&json),
        Err(ManifestError::Parse { .. })
    ));
}

#[test]
fn rejects_empty_url() {
    let artifacts = vec![ArtifactFixture::new("linux", "x64", "  ", valid_sha())];
    let json = manifest_json("{version}", &[ReleaseFixture::new("0.1.0", artifacts)]);
    assert!(matches!(
        parse_manifest(&json),
        Err(ManifestError::EmptyUrl { .. })
    ));
}

#[test]
fn load_manifest_reports_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = camino::Utf8PathBuf::try_from(temp.path().join("missing.json")).expect("UTF-8");
    let err = load_manifest(&path).expect_err("missing file");
    assert!(matches!(err, ManifestError::Read { .. }));
}

#[rstest]
#[case::bare("0.4.0")]
#[case::prefixed("v0.4.0")]
#[case::padded(" 0.4.0 ")]
fn parse_version_accepts_common_spellings(#[case] input: &str) {
    assert_eq!(parse_version(input).expect("valid"), Version::new(0, 4, 0));
}
