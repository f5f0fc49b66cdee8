//! Manifest store: the declarative table of releases and their artefacts.
//!
//! A manifest describes one tool and an append-only list of releases. Each
//! release maps `(os, arch)` pairs to a download URL and a SHA-256 digest.
//!
//! # Sub-modules
//!
//! - [`error`] - Load-time and lookup error types.
//! - [`parser`] - JSON deserialization and validation.
//! - [`release`] - `Tool`, `Release` and `ArtifactEntry` records.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`store`] - The `(version, os, arch)` lookup table (`ManifestStore`).

pub mod error;
pub mod parser;
pub mod release;
pub mod sha256_digest;
pub mod store;

pub use error::{LookupError, ManifestError};
pub use parser::{load_manifest, parse_manifest};
pub use release::{ArtifactEntry, Release, Tool};
pub use sha256_digest::Sha256Digest;
pub use store::ManifestStore;
