//! Shared test utilities for the installer crate.
//!
//! Builds manifests, archives and fake executables in memory so tests never
//! need network access or real release assets.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};

/// Compute the lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One artefact row for [`manifest_json`].
#[derive(Debug, Clone)]
pub struct ArtifactFixture {
    /// OS identifier as written in the manifest.
    pub os: String,
    /// Architecture identifier as written in the manifest.
    pub arch: String,
    /// Download URL (may contain `{version}`).
    pub url: String,
    /// Checksum as written in the manifest.
    pub sha256: String,
}

impl ArtifactFixture {
    /// Create an artefact row.
    pub fn new(os: &str, arch: &str, url: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
            url: url.into(),
            sha256: sha256.into(),
        }
    }
}

/// One release row for [`manifest_json`].
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    /// Version string as written in the manifest.
    pub version: String,
    /// Artefacts of the release.
    pub artifacts: Vec<ArtifactFixture>,
}

impl ReleaseFixture {
    /// Create a release row.
    pub fn new(version: &str, artifacts: Vec<ArtifactFixture>) -> Self {
        Self {
            version: version.to_owned(),
            artifacts,
        }
    }
}

/// Render a manifest document for the `stardust` tool.
pub fn manifest_json(version_output: &str, releases: &[ReleaseFixture]) -> String {
    let releases: Vec<Value> = releases
        .iter()
        .map(|release| {
            let artifacts: Vec<Value> = release
                .artifacts
                .iter()
                .map(|artifact| {
                    json!({
                        "os": artifact.os,
                        "arch": artifact.arch,
                        "url": artifact.url,
                        "sha256": artifact.sha256,
                    })
                })
                .collect();
            json!({
                "version": release.version,
                "license": "MIT",
                "description": "Dart-native documentation framework. Beautiful docs, zero config.",
                "artifacts": artifacts,
            })
        })
        .collect();

    json!({
        "name": "stardust",
        "binary": "stardust",
        "homepage": "https://github.com/nexlabstudio/stardust",
        "version_flag": "--version",
        "version_output": version_output,
        "releases": releases,
    })
    .to_string()
}

/// The four platform artefacts the stardust formula publishes, all carrying
/// the same checksum.
pub fn stardust_artifacts(sha256: &str) -> Vec<ArtifactFixture> {
    let base = "https://github.com/nexlabstudio/stardust/releases/download/v{version}";
    vec![
        ArtifactFixture::new("macos", "arm64", format!("{base}/stardust-darwin-arm64.tar.gz"), sha256),
        ArtifactFixture::new("macos", "x64", format!("{base}/stardust-darwin-x64.tar.gz"), sha256),
        ArtifactFixture::new("linux", "arm64", format!("{base}/stardust-linux-arm64.tar.gz"), sha256),
        ArtifactFixture::new("linux", "x64", format!("{base}/stardust-linux-x64.tar.gz"), sha256),
    ]
}

/// A manifest with releases 0.1.0 and 0.4.0 on all four platforms.
pub fn stardust_manifest_json(sha256: &str) -> String {
    manifest_json(
        "Stardust v{version}",
        &[
            ReleaseFixture::new("0.1.0", stardust_artifacts(sha256)),
            ReleaseFixture::new("0.4.0", stardust_artifacts(sha256)),
        ],
    )
}

/// A `/bin/sh` script that prints `output` and exits successfully.
pub fn version_script(output: &str) -> Vec<u8> {
    format!("#!/bin/sh\necho '{output}'\n").into_bytes()
}

/// Build a `.tar.gz` archive holding `(name, contents)` entries with mode 0755.
pub fn tar_gz_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let encoder = append_tar_entries(encoder, entries);
    encoder.finish().expect("gzip finish")
}

/// Build a `.tar.zst` archive holding `(name, contents)` entries with mode 0755.
pub fn tar_zst_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = zstd::Encoder::new(Vec::new(), 0).expect("zstd encoder");
    let encoder = append_tar_entries(encoder, entries);
    encoder.finish().expect("zstd finish")
}

/// Build a `.zip` archive holding `(name, contents)` entries.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("zip entry");
        writer.write_all(contents).expect("zip write");
    }
    writer.finish().expect("zip finish").into_inner()
}

fn append_tar_entries<W: Write>(writer: W, entries: &[(&str, &[u8])]) -> W {
    let mut builder = tar::Builder::new(writer);
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, name, *contents)
            .expect("append tar entry");
    }
    builder.into_inner().expect("tar finish")
}

/// Build a tar archive whose entry path escapes the extraction directory.
///
/// `tar::Builder` refuses `..` components, so the name is written into the
/// raw header bytes.
pub fn tar_gz_with_raw_path(path: &str, contents: &[u8]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    {
        let name = &mut header.as_old_mut().name;
        let bytes = path.as_bytes();
        name[..bytes.len()].copy_from_slice(bytes);
    }
    header.set_size(contents.len() as u64);
    header.set_mode(0o755);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, contents).expect("append raw entry");
    builder
        .into_inner()
        .expect("tar finish")
        .finish()
        .expect("gzip finish")
}
