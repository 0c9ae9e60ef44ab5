//! Command-driven session: the single owner of the [`Selection`].
//!
//! ```text
//!  SessionHandle ──Command──▶ Session::run ──▶ SessionObserver
//!                               │    ▲
//!               spawn traverse  │    │ Event::Traversed
//!               spawn upload    ▼    │ Event::Submitted
//!                             worker tasks
//! ```
//!
//! Commands are applied in the order they arrive. Drops and submissions run
//! in their own tasks and report back as events, so two drops never wait on
//! each other. A `Submit` snapshots whatever is selected at that moment; a
//! traversal still in flight is not awaited.
//!
//! `Shutdown` stops accepting commands, waits for outstanding tasks, and
//! `run` returns the final selection. A worker that panics still reports
//! back: a traversal as a failed drop, an upload as a failed submission.

use crate::candidate::CandidateFile;
use crate::config::ClientConfig;
use crate::error::DeckDropError;
use crate::pipeline::entry::{FsEntry, LocalEntry};
use crate::pipeline::traverse::{traverse, traverse_paths, TraversalOutput};
use crate::selection::Selection;
use crate::status::{Observer, Status};
use crate::submit::{
    perform, sending_status, Completion, FailureKind, Orchestrator, SubmitState, Uploader,
    NETWORK_ERROR_MESSAGE,
};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Status shown when every dropped item failed to read.
pub const TRAVERSAL_ERROR_MESSAGE: &str = "Error reading the folder structure.";

/// A user action.
#[derive(Debug)]
pub enum Command<E = LocalEntry> {
    /// Files chosen in a picker; merged without traversal.
    Pick(Vec<CandidateFile>),
    /// Dropped items; `None` for items without a filesystem handle.
    Drop(Vec<Option<E>>),
    /// Local paths, walked with [`traverse_paths`]. A path that cannot be
    /// opened counts as a failed item.
    DropPaths(Vec<PathBuf>),
    Remove(usize),
    Submit,
    Shutdown,
}

enum Event {
    Traversed(Result<TraversalOutput, DeckDropError>),
    Submitted(Completion),
}

/// Cloneable sender for [`Command`]s.
#[derive(Debug)]
pub struct SessionHandle<E = LocalEntry> {
    tx: mpsc::Sender<Command<E>>,
}

impl<E> Clone for SessionHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: FsEntry> SessionHandle<E> {
    /// # Errors
    /// [`DeckDropError::Internal`] once the session has stopped.
    pub async fn send(&self, command: Command<E>) -> Result<(), DeckDropError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DeckDropError::Internal("session has stopped".into()))
    }

    pub async fn pick(&self, files: Vec<CandidateFile>) -> Result<(), DeckDropError> {
        self.send(Command::Pick(files)).await
    }

    pub async fn drop_items(&self, items: Vec<Option<E>>) -> Result<(), DeckDropError> {
        self.send(Command::Drop(items)).await
    }

    pub async fn drop_paths(&self, paths: Vec<PathBuf>) -> Result<(), DeckDropError> {
        self.send(Command::DropPaths(paths)).await
    }

    pub async fn remove(&self, index: usize) -> Result<(), DeckDropError> {
        self.send(Command::Remove(index)).await
    }

    pub async fn submit(&self) -> Result<(), DeckDropError> {
        self.send(Command::Submit).await
    }

    pub async fn shutdown(&self) -> Result<(), DeckDropError> {
        self.send(Command::Shutdown).await
    }
}

pub struct Session<E: FsEntry = LocalEntry> {
    selection: Selection,
    orchestrator: Orchestrator,
    config: Arc<ClientConfig>,
    uploader: Arc<dyn Uploader>,
    observer: Observer,
    commands: mpsc::Receiver<Command<E>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    in_flight: usize,
}

impl<E: FsEntry> Session<E> {
    pub fn new(
        config: ClientConfig,
        uploader: Arc<dyn Uploader>,
        observer: Observer,
    ) -> (Self, SessionHandle<E>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            selection: Selection::new(),
            orchestrator: Orchestrator::new(),
            config: Arc::new(config),
            uploader,
            observer,
            commands,
            events_tx,
            events_rx,
            in_flight: 0,
        };
        (session, SessionHandle { tx })
    }

    /// Process commands until `Shutdown` (or every handle is dropped) and all
    /// spawned work has reported back.
    pub async fn run(mut self) -> Selection {
        self.notify_submit_enabled();
        let mut closing = false;

        loop {
            if closing && self.in_flight == 0 {
                break;
            }
            tokio::select! {
                command = self.commands.recv(), if !closing => match command {
                    Some(Command::Shutdown) | None => {
                        debug!("Session closing with {} task(s) in flight", self.in_flight);
                        closing = true;
                    }
                    Some(command) => self.dispatch(command),
                },
                Some(event) = self.events_rx.recv(), if self.in_flight > 0 => {
                    self.in_flight -= 1;
                    self.apply(event);
                }
                else => break,
            }
        }

        info!("Session stopped with {} file(s) selected", self.selection.len());
        self.selection
    }

    fn dispatch(&mut self, command: Command<E>) {
        match command {
            Command::Pick(files) => self.merge(files),
            Command::Drop(items) => self.spawn_traversal(traverse(items)),
            Command::DropPaths(paths) => {
                self.spawn_traversal(async move { traverse_paths(&paths).await })
            }
            Command::Remove(index) => match self.selection.remove_at(index) {
                Ok(_) => self.notify_selection(),
                Err(e) => {
                    warn!("{e}");
                    self.observer.on_status(&Status::error(e.to_string()));
                }
            },
            Command::Submit => self.start_submit(),
            Command::Shutdown => {}
        }
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Traversed(Ok(output)) => {
                if !output.failures.is_empty() {
                    warn!("{} dropped item(s) could not be read", output.failures.len());
                }
                for failure in &output.failures {
                    self.observer.on_entry_failed(failure);
                }
                self.merge(output.candidates);
            }
            Event::Traversed(Err(e)) => {
                error!("{e}");
                if let DeckDropError::TraversalFailed { first_error, .. } = &e {
                    self.observer.on_entry_failed(first_error);
                }
                self.observer.on_status(&Status::error(TRAVERSAL_ERROR_MESSAGE));
            }
            Event::Submitted(completion) => {
                let (terminal, status) = self.orchestrator.finish(completion, &mut self.selection);
                if terminal == SubmitState::Succeeded {
                    self.observer.on_selection_changed(self.selection.files());
                }
                self.observer.on_status(&status);
                self.notify_submit_enabled();
            }
        }
    }

    fn merge(&mut self, candidates: Vec<CandidateFile>) {
        let summary = self.selection.add_batch(candidates, &self.config.allow_list);
        if summary.added > 0 {
            self.notify_selection();
        }
        self.observer.on_status(&summary.status());
    }

    fn spawn_traversal<F>(&mut self, walk: F)
    where
        F: Future<Output = Result<TraversalOutput, DeckDropError>> + Send + 'static,
    {
        let events = self.events_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = AssertUnwindSafe(walk).catch_unwind().await.unwrap_or_else(|_| {
                Err(DeckDropError::Internal("traversal task panicked".into()))
            });
            let _ = events.send(Event::Traversed(result));
        });
    }

    fn start_submit(&mut self) {
        let files = match self.orchestrator.begin(&self.selection, &self.config) {
            Ok(files) => files,
            Err(status) => {
                self.observer.on_status(&status);
                return;
            }
        };
        self.observer.on_submit_enabled(false);
        self.observer.on_status(&sending_status(files.len()));

        let events = self.events_tx.clone();
        let uploader = Arc::clone(&self.uploader);
        let config = Arc::clone(&self.config);
        self.in_flight += 1;
        tokio::spawn(async move {
            let upload = perform(uploader.as_ref(), &files, &config);
            let completion = AssertUnwindSafe(upload).catch_unwind().await.unwrap_or_else(|_| {
                error!("Upload task panicked");
                Completion::Failed {
                    kind: FailureKind::Network,
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                }
            });
            let _ = events.send(Event::Submitted(completion));
        });
    }

    fn notify_selection(&self) {
        self.observer.on_selection_changed(self.selection.files());
        self.notify_submit_enabled();
    }

    fn notify_submit_enabled(&self) {
        self.observer
            .on_submit_enabled(self.orchestrator.can_submit(&self.selection));
    }
}
