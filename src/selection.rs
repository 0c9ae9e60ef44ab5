//! The authoritative, ordered, deduplicated list of queued files.
//!
//! [`Selection`] is the only mutable shared state in the client. It exposes
//! exactly four mutations and no way to reach into its storage, so the
//! `(name, size)` uniqueness invariant cannot be broken from outside.

use crate::candidate::{CandidateFile, FileKey};
use crate::config::AllowList;
use crate::error::DeckDropError;
use crate::pipeline::validate::filter_batch;
use crate::status::Status;
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of merging one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub added: usize,
    /// Not allowed, or duplicates.
    pub rejected: usize,
}

impl BatchSummary {
    /// The status line a front end shows after merging this batch.
    pub fn status(&self) -> Status {
        if self.added > 0 {
            Status::info(format!("{} file(s) added.", self.added))
        } else {
            Status::info("No new valid files found.")
        }
    }
}

/// Ordered list of accepted files. Insertion order drives display and
/// removal-by-index.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    files: Vec<CandidateFile>,
    keys: HashSet<FileKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every candidate the validator accepts, in batch order.
    ///
    /// The batch is filtered completely before anything is appended.
    pub fn add_batch(&mut self, candidates: Vec<CandidateFile>, allow: &AllowList) -> BatchSummary {
        let (accepted, rejected) = filter_batch(candidates, &self.keys, allow);
        let added = accepted.len();
        for file in accepted {
            self.keys.insert(file.key());
            self.files.push(file);
        }
        if added > 0 {
            info!("Added {} file(s), {} skipped", added, rejected);
        } else {
            debug!("No new valid files ({} skipped)", rejected);
        }
        BatchSummary { added, rejected }
    }

    /// Remove the file at `index`; later files shift down by one.
    ///
    /// # Errors
    /// [`DeckDropError::IndexOutOfRange`] if `index >= len()`; the selection
    /// is left untouched.
    pub fn remove_at(&mut self, index: usize) -> Result<CandidateFile, DeckDropError> {
        if index >= self.files.len() {
            return Err(DeckDropError::IndexOutOfRange {
                index,
                len: self.files.len(),
            });
        }
        let removed = self.files.remove(index);
        self.keys.remove(&removed.key());
        debug!("Removed '{}'", removed.name());
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.keys.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[CandidateFile] {
        &self.files
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(CandidateFile::size).sum()
    }
}
