//! Ingestion stages: from dropped or picked entries to a validated batch.
//!
//! ## Data Flow
//!
//! ```text
//! entries ──▶ entry ──▶ traverse ──▶ validate ──▶ Selection
//!            (classify)  (fan-out/   (allow-list,
//!                         fan-in)     dedup)
//! ```
//!
//! 1. [`entry`]: classify one entry as container, leaf or neither and
//!    resolve leaves to [`crate::CandidateFile`]s; also the flat `pick` path
//! 2. [`traverse`]: recursive concurrent walk with per-branch failure
//!    isolation
//! 3. [`validate`]: pure accept/reject predicate, folded over a batch
//!
//! [`memory`] provides an in-memory [`entry::FsEntry`] tree.

pub mod entry;
pub mod memory;
pub mod traverse;
pub mod validate;
