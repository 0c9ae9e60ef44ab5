//! Allow-list and duplicate filtering for a batch of candidates.
//!
//! Neither rejection is an error: rejected files are dropped silently and
//! only counted.

use crate::candidate::{CandidateFile, FileKey};
use crate::config::AllowList;
use std::collections::HashSet;
use tracing::debug;

/// `true` when the candidate's type or extension is allowed.
///
/// The declared type is matched exactly; the extension fallback applies only
/// when no type was declared.
pub fn is_allowed(candidate: &CandidateFile, allow: &AllowList) -> bool {
    let declared = candidate.declared_type();
    allow.allows_type(declared) || (declared.is_empty() && allow.allows_name(candidate.name()))
}

/// Decide whether one candidate joins the selection.
///
/// Accepts iff it is allowed and its `(name, size)` is neither already
/// selected nor already accepted earlier in the same batch.
pub fn accept(
    candidate: &CandidateFile,
    already_selected: &HashSet<FileKey>,
    accepted_this_batch: &HashSet<FileKey>,
    allow: &AllowList,
) -> bool {
    if !is_allowed(candidate, allow) {
        debug!(
            "Skipped '{}': type '{}' not allowed",
            candidate.name(),
            candidate.declared_type()
        );
        return false;
    }
    let key = candidate.key();
    if already_selected.contains(&key) || accepted_this_batch.contains(&key) {
        debug!("Skipped '{}': already selected", candidate.name());
        return false;
    }
    true
}

/// Fold [`accept`] left to right over a batch.
///
/// Returns the accepted candidates in batch order and the number rejected.
pub fn filter_batch(
    candidates: Vec<CandidateFile>,
    already_selected: &HashSet<FileKey>,
    allow: &AllowList,
) -> (Vec<CandidateFile>, usize) {
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    let mut rejected = 0;
    for candidate in candidates {
        if accept(&candidate, already_selected, &seen, allow) {
            seen.insert(candidate.key());
            accepted.push(candidate);
        } else {
            rejected += 1;
        }
    }
    (accepted, rejected)
}
