//! Status line and observer trait for presentation layers.
//!
//! The core never renders anything. It reports state changes to an
//! [`Arc<dyn SessionObserver>`]; a terminal UI, a GUI or a test recorder
//! decides what to show. Every status fully replaces the previous one.
//!
//! # Example
//!
//! ```rust
//! use edgequake_deckdrop::{SessionObserver, Status};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct LastStatus(Mutex<Option<Status>>);
//!
//! impl SessionObserver for LastStatus {
//!     fn on_status(&self, status: &Status) {
//!         *self.0.lock().unwrap() = Some(status.clone());
//!     }
//! }
//!
//! let observer = LastStatus::default();
//! observer.on_status(&Status::info("2 file(s) added."));
//! observer.on_selection_changed(&[]);
//! ```

use crate::candidate::CandidateFile;
use crate::error::EntryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// One human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub severity: Severity,
    pub message: String,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Receives state changes from a [`crate::session::Session`].
///
/// All methods default to no-ops. Calls come from the session task, one at a
/// time, but implementations must be `Send + Sync` since the session runs on
/// the Tokio runtime.
pub trait SessionObserver: Send + Sync {
    /// The status line changed.
    fn on_status(&self, status: &Status) {
        let _ = status;
    }

    /// The selection changed; `files` is the full new list.
    fn on_selection_changed(&self, files: &[CandidateFile]) {
        let _ = files;
    }

    /// Whether a submission may be started right now.
    fn on_submit_enabled(&self, enabled: bool) {
        let _ = enabled;
    }

    /// One dropped entry could not be read. Its siblings are unaffected.
    fn on_entry_failed(&self, error: &EntryError) {
        let _ = error;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type a session stores.
pub type Observer = Arc<dyn SessionObserver>;
