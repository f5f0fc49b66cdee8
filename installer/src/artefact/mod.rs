//! Artefact retrieval and unpacking.
//!
//! # Sub-modules
//!
//! - [`download`] - Downloader trait and the `ureq`-backed implementation.
//! - [`fetch`] - Streaming fetch into a temp file with SHA-256 verification.
//! - [`extraction`] - Archive formats and extraction with path traversal
//!   protection.

pub mod download;
pub mod extraction;
pub mod fetch;
