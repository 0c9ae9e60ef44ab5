//! Submission: upload the selection, save the result, update the selection.
//!
//! ## State machine
//!
//! ```text
//!          begin (selection non-empty, within size limit)
//!   Idle ──────────────────────────────────────────▶ Submitting
//!    ▲                                                 │
//!    │  finish: selection cleared      ┌── Succeeded ◀─┤ upload + save ok
//!    ├─────────────────────────────────┘               │
//!    │  finish: selection untouched    ┌── Failed ◀────┘ network / server / write error
//!    └─────────────────────────────────┘
//! ```
//!
//! `begin` refuses (and stays `Idle`) on an empty or oversized selection,
//! and while another submission is in flight. Nothing is retried
//! automatically; every retry is a fresh `begin`.
//!
//! The network call sits behind the [`Uploader`] trait. [`HttpUploader`] is
//! the reqwest implementation; tests substitute their own.

use crate::candidate::{CandidateFile, FileContent};
use crate::config::ClientConfig;
use crate::disposition::suggested_filename;
use crate::error::DeckDropError;
use crate::save::{sanitize_filename, save_result};
use crate::selection::Selection;
use crate::status::{SessionObserver, Status};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

/// Multipart field every file is attached under.
pub const FILES_FIELD: &str = "files";

/// Status shown for any transport-level failure; details go to the log.
pub const NETWORK_ERROR_MESSAGE: &str = "A network or client error occurred. See the log for details.";

// ── Transport ────────────────────────────────────────────────────────────

/// What came back from the endpoint, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `Bad Request`.
    pub status_text: String,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a set of files to the conversion endpoint.
///
/// Implementations return `Ok` for every response the server produced
/// (including error statuses) and `Err` only when no usable response exists.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, files: &[CandidateFile]) -> Result<UploadResponse, DeckDropError>;
}

/// Multipart `POST` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpUploader {
    pub fn new(config: &ClientConfig) -> Result<Self, DeckDropError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DeckDropError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn build_form(files: &[CandidateFile]) -> Result<Form, DeckDropError> {
        let mut form = Form::new();
        for file in files {
            form = form.part(FILES_FIELD, Self::file_part(file).await?);
        }
        Ok(form)
    }

    /// On-disk content is streamed from an open handle; nothing is buffered.
    async fn file_part(file: &CandidateFile) -> Result<Part, DeckDropError> {
        let unavailable = |source| DeckDropError::ContentUnavailable {
            name: file.name().to_string(),
            source,
        };
        let part = match file.content() {
            FileContent::OnDisk(path) => {
                let handle = tokio::fs::File::open(path).await.map_err(unavailable)?;
                let len = handle.metadata().await.map_err(unavailable)?.len();
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), len)
            }
            FileContent::InMemory(bytes) => Part::bytes(bytes.clone()),
        };

        let declared = file.declared_type();
        let mime = if declared.parse::<mime_guess::Mime>().is_ok() {
            declared
        } else {
            "application/octet-stream"
        };
        part.file_name(file.name().to_string())
            .mime_str(mime)
            .map_err(|e| DeckDropError::Internal(format!("MIME error: {e}")))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, files: &[CandidateFile]) -> Result<UploadResponse, DeckDropError> {
        let form = Self::build_form(files).await?;
        info!("Uploading {} file(s) to {}", files.len(), self.endpoint);

        let network_error = |e: reqwest::Error| {
            if e.is_timeout() {
                DeckDropError::UploadTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                DeckDropError::NetworkFailure {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(network_error)?.to_vec();

        debug!("Endpoint answered {} with {} bytes", status, body.len());
        Ok(UploadResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_disposition,
            body,
        })
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────

/// Why a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Endpoint unreachable, timeout, unreadable response or local content.
    Network,
    /// Endpoint answered with an error status.
    Server,
    /// The result arrived but could not be written.
    Output,
}

/// Interpretation of one endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success {
        content: Vec<u8>,
        suggested_filename: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Turn a raw response into an [`UploadOutcome`].
///
/// Success takes its filename from the disposition header, falling back to
/// `default_filename`. Failure takes its message from the JSON `error` field,
/// falling back to the status text.
pub fn interpret(response: UploadResponse, default_filename: &str) -> UploadOutcome {
    if response.is_success() {
        let suggested_filename = response
            .content_disposition
            .as_deref()
            .and_then(suggested_filename)
            .unwrap_or_else(|| default_filename.to_string());
        return UploadOutcome::Success {
            content: response.body,
            suggested_filename,
        };
    }

    let reason = serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            if response.status_text.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                response.status_text.clone()
            }
        });
    warn!("Server rejected upload (HTTP {}): {}", response.status, reason);
    UploadOutcome::Failure {
        kind: FailureKind::Server,
        message: format!("Server error: {reason}"),
    }
}

/// End result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Saved(PathBuf),
    Failed { kind: FailureKind, message: String },
}

/// Upload `files`, interpret the response and save a successful result.
///
/// Never returns an error: every failure becomes [`Completion::Failed`].
pub async fn perform(
    uploader: &dyn Uploader,
    files: &[CandidateFile],
    config: &ClientConfig,
) -> Completion {
    let outcome = match uploader.upload(files).await {
        Ok(response) => interpret(response, &config.default_filename),
        Err(DeckDropError::ServerRejected { status, message }) => {
            warn!("Server rejected upload (HTTP {status}): {message}");
            UploadOutcome::Failure {
                kind: FailureKind::Server,
                message: format!("Server error: {message}"),
            }
        }
        Err(e) => {
            error!("Upload failed: {e}");
            UploadOutcome::Failure {
                kind: FailureKind::Network,
                message: NETWORK_ERROR_MESSAGE.to_string(),
            }
        }
    };

    match outcome {
        UploadOutcome::Success {
            content,
            suggested_filename,
        } => {
            let filename = sanitize_filename(&suggested_filename)
                .unwrap_or_else(|| config.default_filename.clone());
            match save_result(&config.output_dir, &filename, content).await {
                Ok(path) => Completion::Saved(path),
                Err(e) => {
                    error!("{e}");
                    Completion::Failed {
                        kind: FailureKind::Output,
                        message: format!("Could not save the result: {e}"),
                    }
                }
            }
        }
        UploadOutcome::Failure { kind, message } => Completion::Failed { kind, message },
    }
}

// ── State machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Guards and applies submissions against a [`Selection`].
#[derive(Debug)]
pub struct Orchestrator {
    state: SubmitState,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            state: SubmitState::Idle,
        }
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Whether the submit trigger should be enabled.
    pub fn can_submit(&self, selection: &Selection) -> bool {
        self.state != SubmitState::Submitting && !selection.is_empty()
    }

    /// `Idle → Submitting`. Returns a snapshot of the files to send.
    ///
    /// # Errors
    /// A user-facing status when the transition is refused; the state is
    /// left unchanged.
    pub fn begin(
        &mut self,
        selection: &Selection,
        config: &ClientConfig,
    ) -> Result<Vec<CandidateFile>, Status> {
        if self.state == SubmitState::Submitting {
            return Err(Status::error("A submission is already in progress."));
        }
        if selection.is_empty() {
            return Err(Status::error("Please select files first."));
        }
        let total = selection.total_bytes();
        if total > config.max_upload_bytes {
            return Err(Status::error(format!(
                "Selection is {:.1} MB, above the {:.1} MB upload limit. Remove some files and try again.",
                megabytes(total),
                megabytes(config.max_upload_bytes)
            )));
        }
        self.state = SubmitState::Submitting;
        info!("Submitting {} file(s), {} bytes", selection.len(), total);
        Ok(selection.files().to_vec())
    }

    /// `Submitting → Succeeded | Failed → Idle`.
    ///
    /// Success clears the selection; failure leaves it exactly as it was.
    /// Returns the terminal state reached and the status to display.
    ///
    /// Outside `Submitting` the completion is discarded, nothing changes and
    /// the current state comes back with an error status.
    pub fn finish(&mut self, completion: Completion, selection: &mut Selection) -> (SubmitState, Status) {
        if self.state != SubmitState::Submitting {
            warn!("Discarding {completion:?}: no submission in progress");
            return (self.state, Status::error("No submission is in progress."));
        }
        let (terminal, status) = match completion {
            Completion::Saved(path) => {
                selection.clear();
                (
                    SubmitState::Succeeded,
                    Status::success(format!(
                        "Presentation created and saved to {}.",
                        path.display()
                    )),
                )
            }
            Completion::Failed { kind, message } => {
                debug!("Submission failed ({kind:?}); selection kept");
                (SubmitState::Failed, Status::error(message))
            }
        };
        self.state = SubmitState::Idle;
        (terminal, status)
    }

    /// Run a whole submission inline: begin, upload, save, finish.
    ///
    /// Reports every status change to `observer` and returns the terminal
    /// state, or [`SubmitState::Idle`] if `begin` refused.
    pub async fn submit(
        &mut self,
        uploader: &dyn Uploader,
        selection: &mut Selection,
        config: &ClientConfig,
        observer: &dyn SessionObserver,
    ) -> SubmitState {
        let files = match self.begin(selection, config) {
            Ok(files) => files,
            Err(status) => {
                observer.on_status(&status);
                return self.state;
            }
        };
        observer.on_submit_enabled(false);
        observer.on_status(&sending_status(files.len()));

        let completion = perform(uploader, &files, config).await;
        let (terminal, status) = self.finish(completion, selection);

        if terminal == SubmitState::Succeeded {
            observer.on_selection_changed(selection.files());
        }
        observer.on_status(&status);
        observer.on_submit_enabled(self.can_submit(selection));
        terminal
    }
}

/// Status shown while a submission is in flight.
pub fn sending_status(count: usize) -> Status {
    Status::info(format!("Sending {count} file(s) for processing…"))
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllowList;

    fn response(status: u16, text: &str, disposition: Option<&str>, body: &[u8]) -> UploadResponse {
        UploadResponse {
            status,
            status_text: text.to_string(),
            content_disposition: disposition.map(str::to_string),
            body: body.to_vec(),
        }
    }

    fn selection_of(names: &[&str]) -> Selection {
        let mut sel = Selection::new();
        sel.add_batch(
            names
                .iter()
                .map(|n| CandidateFile::from_bytes(*n, "image/png", n.as_bytes().to_vec()))
                .collect(),
            &AllowList::default(),
        );
        sel
    }

    #[test]
    fn success_uses_disposition_filename() {
        let outcome = interpret(
            response(200, "OK", Some(r#"attachment; filename="deck.pptx""#), b"PK"),
            "presentation.pptx",
        );
        assert_eq!(
            outcome,
            UploadOutcome::Success {
                content: b"PK".to_vec(),
                suggested_filename: "deck.pptx".into()
            }
        );
    }

    #[test]
    fn success_without_header_uses_default() {
        let outcome = interpret(response(200, "OK", None, b"PK"), "presentation.pptx");
        assert!(matches!(
            outcome,
            UploadOutcome::Success { ref suggested_filename, .. } if suggested_filename == "presentation.pptx"
        ));
    }

    #[test]
    fn failure_message_from_json_error() {
        let outcome = interpret(
            response(400, "Bad Request", None, br#"{"error":"bad file"}"#),
            "presentation.pptx",
        );
        assert_eq!(
            outcome,
            UploadOutcome::Failure {
                kind: FailureKind::Server,
                message: "Server error: bad file".into()
            }
        );
    }

    #[test]
    fn failure_falls_back_to_status_text() {
        let outcome = interpret(
            response(502, "Bad Gateway", None, b"<html>upstream down</html>"),
            "x.pptx",
        );
        assert!(matches!(outcome, UploadOutcome::Failure { ref message, .. } if message == "Server error: Bad Gateway"));

        let outcome = interpret(response(599, "", None, b"{}"), "x.pptx");
        assert!(matches!(outcome, UploadOutcome::Failure { ref message, .. } if message == "Server error: HTTP 599"));
    }

    #[test]
    fn begin_refuses_empty_selection() {
        let mut orch = Orchestrator::new();
        let status = orch
            .begin(&Selection::new(), &ClientConfig::default())
            .unwrap_err();
        assert!(status.is_error());
        assert_eq!(orch.state(), SubmitState::Idle);
    }

    #[test]
    fn begin_refuses_reentry() {
        let mut orch = Orchestrator::new();
        let sel = selection_of(&["a.png"]);
        let config = ClientConfig::default();
        assert_eq!(orch.begin(&sel, &config).unwrap().len(), 1);
        assert_eq!(orch.state(), SubmitState::Submitting);
        assert!(!orch.can_submit(&sel));

        let status = orch.begin(&sel, &config).unwrap_err();
        assert!(status.message.contains("already in progress"));
        assert_eq!(orch.state(), SubmitState::Submitting);
    }

    #[test]
    fn begin_refuses_oversized_selection() {
        let mut orch = Orchestrator::new();
        let sel = selection_of(&["a.png", "bb.png"]);
        let config = ClientConfig::builder().max_upload_bytes(5).build().unwrap();
        let status = orch.begin(&sel, &config).unwrap_err();
        assert!(status.message.contains("upload limit"), "got: {}", status.message);
        assert_eq!(orch.state(), SubmitState::Idle);
    }

    #[test]
    fn finish_without_begin_leaves_selection_alone() {
        let mut orch = Orchestrator::new();
        let mut sel = selection_of(&["a.png", "b.png"]);

        let (state, status) = orch.finish(Completion::Saved(PathBuf::from("deck.pptx")), &mut sel);
        assert_eq!(state, SubmitState::Idle);
        assert!(status.is_error());
        assert_eq!(sel.len(), 2);
        assert_eq!(orch.state(), SubmitState::Idle);
    }

    #[test]
    fn finish_clears_only_on_success() {
        let config = ClientConfig::default();
        let mut orch = Orchestrator::new();

        let mut sel = selection_of(&["a.png", "b.png"]);
        orch.begin(&sel, &config).unwrap();
        let (state, status) = orch.finish(
            Completion::Failed {
                kind: FailureKind::Server,
                message: "Server error: bad file".into(),
            },
            &mut sel,
        );
        assert_eq!(state, SubmitState::Failed);
        assert!(status.message.contains("bad file"));
        assert_eq!(sel.len(), 2);
        assert_eq!(orch.state(), SubmitState::Idle);

        orch.begin(&sel, &config).unwrap();
        let (state, status) = orch.finish(Completion::Saved(PathBuf::from("out/deck.pptx")), &mut sel);
        assert_eq!(state, SubmitState::Succeeded);
        assert_eq!(status.severity, crate::status::Severity::Success);
        assert!(sel.is_empty());
        assert_eq!(orch.state(), SubmitState::Idle);
    }
}
