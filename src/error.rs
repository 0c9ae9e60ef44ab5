//! Error types for the edgequake-deckdrop library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DeckDropError`]: **Fatal for the operation**: a whole drop could not
//!   be read, a submission failed, the result could not be written. Returned
//!   as `Err(DeckDropError)` and surfaced to the user as an error status.
//!
//! * [`EntryError`]: **Non-fatal**: one directory could not be enumerated or
//!   one file could not be resolved while walking a dropped tree. Recorded in
//!   [`crate::pipeline::traverse::TraversalOutput::failures`] and logged; the
//!   sibling branches still contribute their files.
//!
//! Files rejected by the allow-list or as duplicates are not errors at all:
//! they only show up in [`crate::selection::BatchSummary::rejected`].

use std::path::PathBuf;
use thiserror::Error;

/// All operation-level errors returned by the edgequake-deckdrop library.
#[derive(Debug, Error)]
pub enum DeckDropError {
    // ── Ingestion errors ──────────────────────────────────────────────────
    /// No top-level entry of a drop could be read at all.
    #[error("Could not read any of the {failed} dropped entries.\nFirst error: {first_error}")]
    TraversalFailed { failed: usize, first_error: EntryError },

    /// `remove_at` was called with an index outside the selection.
    #[error("Index {index} is out of range (selection has {len} files)")]
    IndexOutOfRange { index: usize, len: usize },

    // ── Submission errors ─────────────────────────────────────────────────
    /// The endpoint could not be reached or the response could not be read.
    #[error("Upload to '{endpoint}' failed: {reason}")]
    NetworkFailure { endpoint: String, reason: String },

    /// The upload timed out.
    #[error("Upload timed out after {secs}s\nIncrease --timeout.")]
    UploadTimeout { secs: u64 },

    /// A queued file's content could not be read while building the request.
    #[error("Could not read '{name}' for upload: {source}")]
    ContentUnavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("Server rejected the upload (HTTP {status}): {message}")]
    ServerRejected { status: u16, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the converted result to disk.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeckDropError {
    /// `true` for failures on the transport side of a submission (endpoint
    /// unreachable, timeout, unreadable local content).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            DeckDropError::NetworkFailure { .. }
                | DeckDropError::UploadTimeout { .. }
                | DeckDropError::ContentUnavailable { .. }
        )
    }
}

/// A non-fatal error for a single entry of a dropped tree.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum EntryError {
    /// The entry disappeared between the drop and its resolution.
    #[error("'{name}': not found")]
    NotFound { name: String },

    /// A directory could not be enumerated.
    #[error("'{name}': could not list directory: {detail}")]
    ReadDirFailed { name: String, detail: String },

    /// A file's metadata or content handle could not be resolved.
    #[error("'{name}': could not read file: {detail}")]
    ResolveFailed { name: String, detail: String },
}

impl EntryError {
    /// Name of the entry the error belongs to.
    pub fn name(&self) -> &str {
        match self {
            EntryError::NotFound { name }
            | EntryError::ReadDirFailed { name, .. }
            | EntryError::ResolveFailed { name, .. } => name,
        }
    }
}
