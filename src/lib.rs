//! # edgequake-deckdrop
//!
//! Collect documents from dropped files and folders and send them to a
//! conversion service that answers with a generated presentation.
//!
//! ## Why this crate?
//!
//! Dropping a folder should mean "everything inside it", at any depth, even
//! when one subfolder is unreadable. This crate walks dropped trees
//! concurrently, keeps the files a converter can handle, never queues the
//! same file twice, and turns the server's answer into a saved `.pptx`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! dropped items / picked files
//!  │
//!  ├─ 1. Classify  directory, file, or neither        (pipeline::entry)
//!  ├─ 2. Walk      recursive, concurrent, isolated     (pipeline::traverse)
//!  ├─ 3. Validate  allow-list + (name, size) dedup     (pipeline::validate)
//!  ├─ 4. Select    ordered queue, remove by index      (selection)
//!  ├─ 5. Submit    multipart POST, field "files"       (submit)
//!  └─ 6. Save      Content-Disposition name, atomic    (disposition, save)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_deckdrop::{traverse_paths, ClientConfig, HttpUploader, NoopObserver, Orchestrator, Selection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .endpoint("http://localhost:5000/upload")
//!         .output_dir("out")
//!         .build()?;
//!
//!     let walked = traverse_paths(&["slides/", "notes.pdf"]).await?;
//!     let mut selection = Selection::new();
//!     let summary = selection.add_batch(walked.candidates, &config.allow_list);
//!     eprintln!("{} file(s) added, {} skipped", summary.added, summary.rejected);
//!
//!     let uploader = HttpUploader::new(&config)?;
//!     let state = Orchestrator::new()
//!         .submit(&uploader, &mut selection, &config, &NoopObserver)
//!         .await;
//!     eprintln!("{state:?}");
//!     Ok(())
//! }
//! ```
//!
//! For an interactive front end, run a [`Session`] and feed it
//! [`Command`]s through its [`SessionHandle`]; state changes arrive on a
//! [`SessionObserver`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deckdrop` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-deckdrop = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod candidate;
pub mod config;
pub mod disposition;
pub mod error;
pub mod pipeline;
pub mod save;
pub mod selection;
pub mod session;
pub mod status;
pub mod submit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use candidate::{CandidateFile, FileContent, FileKey};
pub use config::{AllowList, ClientConfig, ClientConfigBuilder};
pub use disposition::suggested_filename;
pub use error::{DeckDropError, EntryError};
pub use pipeline::entry::{classify, pick, pick_paths, Classified, EntryKind, FsEntry, LocalEntry};
pub use pipeline::memory::MemEntry;
pub use pipeline::traverse::{traverse, traverse_paths, TraversalOutput};
pub use save::save_result;
pub use selection::{BatchSummary, Selection};
pub use session::{Command, Session, SessionHandle};
pub use status::{NoopObserver, Observer, SessionObserver, Severity, Status};
pub use submit::{
    interpret, Completion, FailureKind, HttpUploader, Orchestrator, SubmitState, UploadOutcome,
    UploadResponse, Uploader,
};
