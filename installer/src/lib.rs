//! Release installer library.
//!
//! This crate provides the core functionality for installing prebuilt
//! release binaries described by a JSON manifest: picking the artefact for
//! the current platform, downloading and verifying it, extracting the
//! executable, and writing it atomically into a bin directory. It is used by
//! the `release-installer` CLI binary and can be consumed programmatically
//! for testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`artefact`] - Download, checksum verification and archive extraction
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered configuration from flags, environment and file
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Semantic error types with exit codes
//! - [`install`] - Locked, atomic writes into the target directory
//! - [`list_output`] - Output formatting for release listing
//! - [`manifest`] - Manifest model, parsing and lookup
//! - [`output`] - Progress and dry-run messages
//! - [`pipeline`] - Install state machine
//! - [`platform`] - Operating system and architecture detection
//! - [`release_check`] - Verification of every artefact of a release
//! - [`verify`] - Post-install version check

pub mod artefact;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod install;
pub mod list_output;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod release_check;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
