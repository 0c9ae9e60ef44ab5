//! Recursive traversal of a dropped tree.
//!
//! ```text
//! drop items ─▶ walk(root₁) ┐
//!               walk(root₂) ┼─ join_all ─▶ TraversalOutput
//!               walk(rootₙ) ┘
//!                  │
//!                  └─ container: read_children ─▶ join_all(walk(child)…)
//! ```
//!
//! Every directory level fans out into its children concurrently and joins
//! on all of them before returning, so a batch is only observable once every
//! branch has finished. Failures are caught inside the branch that hit them:
//! that branch contributes nothing, its error is recorded, and siblings keep
//! going. Only when *every* top-level entry fails at its root does the whole
//! traversal report [`DeckDropError::TraversalFailed`].
//!
//! Each branch carries the identities of the directories above it. A
//! container that resolves to one of them (a symlink back up the tree) is
//! counted as ignored instead of entered, so cyclic trees still finish.
//!
//! Result order follows the tree order of the input, but nothing downstream
//! depends on it: dedup is keyed on `(name, size)`.

use crate::candidate::CandidateFile;
use crate::error::{DeckDropError, EntryError};
use crate::pipeline::entry::{classify, Classified, FsEntry, LocalEntry};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything one traversal produced.
#[derive(Debug, Default)]
pub struct TraversalOutput {
    /// Resolved leaves, not yet validated.
    pub candidates: Vec<CandidateFile>,
    /// Isolated failures; each one cost a single branch.
    pub failures: Vec<EntryError>,
    /// Directories successfully enumerated.
    pub containers_visited: usize,
    /// Entries that were neither files nor directories.
    pub ignored: usize,
}

impl TraversalOutput {
    fn absorb(&mut self, other: TraversalOutput) {
        self.candidates.extend(other.candidates);
        self.failures.extend(other.failures);
        self.containers_visited += other.containers_visited;
        self.ignored += other.ignored;
    }
}

/// Outcome of one branch rooted at a single entry.
struct Branch {
    output: TraversalOutput,
    /// The root of this branch itself failed to enumerate or resolve.
    root_failed: bool,
}

/// Walk all top-level drop items and collect their leaves.
///
/// `None` items stand for drop items without a filesystem handle (plain
/// text, links) and are skipped.
///
/// # Errors
/// [`DeckDropError::TraversalFailed`] when at least one entry was dropped
/// and every one of them failed at its root.
pub async fn traverse<E: FsEntry>(
    items: Vec<Option<E>>,
) -> Result<TraversalOutput, DeckDropError> {
    let roots: Vec<E> = items.into_iter().flatten().collect();
    let root_count = roots.len();
    debug!("Traversing {} top-level entries", root_count);

    let branches = join_all(roots.into_iter().map(|root| walk(root, Vec::new()))).await;

    let all_failed = root_count > 0 && branches.iter().all(|b| b.root_failed);
    let mut output = TraversalOutput::default();
    for branch in branches {
        output.absorb(branch.output);
    }

    if all_failed {
        let first_error = output.failures.first().cloned().ok_or_else(|| {
            DeckDropError::Internal("root failure without a recorded error".into())
        })?;
        return Err(DeckDropError::TraversalFailed {
            failed: root_count,
            first_error,
        });
    }

    info!(
        "Traversal complete: {} files, {} directories, {} failures, {} ignored",
        output.candidates.len(),
        output.containers_visited,
        output.failures.len(),
        output.ignored
    );
    Ok(output)
}

/// Open each path on the local filesystem and traverse them together.
///
/// A path that cannot be opened counts as a failed top-level entry.
pub async fn traverse_paths<P: AsRef<Path>>(
    paths: &[P],
) -> Result<TraversalOutput, DeckDropError> {
    let opened = join_all(paths.iter().map(|p| LocalEntry::open(p.as_ref()))).await;

    let mut entries = Vec::with_capacity(opened.len());
    let mut open_failures = Vec::new();
    for result in opened {
        match result {
            Ok(entry) => entries.push(Some(entry)),
            Err(e) => {
                warn!("Skipping dropped path: {e}");
                open_failures.push(e);
            }
        }
    }

    if entries.is_empty() {
        if let Some(first_error) = open_failures.first().cloned() {
            return Err(DeckDropError::TraversalFailed {
                failed: open_failures.len(),
                first_error,
            });
        }
    }

    match traverse(entries).await {
        Ok(mut output) => {
            output.failures.extend(open_failures);
            Ok(output)
        }
        Err(DeckDropError::TraversalFailed {
            failed,
            first_error,
        }) => Err(DeckDropError::TraversalFailed {
            failed: failed + open_failures.len(),
            first_error,
        }),
        Err(e) => Err(e),
    }
}

/// Walk one subtree. Never fails: errors are folded into the branch.
///
/// `ancestors` holds the identities of the enclosing directories.
fn walk<E: FsEntry>(entry: E, mut ancestors: Vec<PathBuf>) -> BoxFuture<'static, Branch> {
    async move {
        let name = entry.name().to_string();
        match classify(entry).await {
            Ok(Classified::LeafResolved(file)) => Branch {
                output: TraversalOutput {
                    candidates: vec![file],
                    ..Default::default()
                },
                root_failed: false,
            },
            Ok(Classified::Ignored) => ignored_branch(),
            Ok(Classified::Container(dir)) => {
                if let Some(id) = dir.identity() {
                    if ancestors.iter().any(|a| a == id) {
                        debug!("Not entering '{}': it links back to an enclosing directory", name);
                        return ignored_branch();
                    }
                    ancestors.push(id.to_path_buf());
                }
                match dir.read_children().await {
                    Ok(children) => {
                        debug!("Scanning directory '{}' ({} entries)", name, children.len());
                        let mut output = TraversalOutput {
                            containers_visited: 1,
                            ..Default::default()
                        };
                        let walks = children
                            .into_iter()
                            .map(|child| walk(child, ancestors.clone()));
                        for child in join_all(walks).await {
                            output.absorb(child.output);
                        }
                        Branch {
                            output,
                            root_failed: false,
                        }
                    }
                    Err(e) => failed_branch(e),
                }
            }
            Err(e) => failed_branch(e),
        }
    }
    .boxed()
}

fn ignored_branch() -> Branch {
    Branch {
        output: TraversalOutput {
            ignored: 1,
            ..Default::default()
        },
        root_failed: false,
    }
}

fn failed_branch(error: EntryError) -> Branch {
    warn!("Skipping {error}");
    Branch {
        output: TraversalOutput {
            failures: vec![error],
            ..Default::default()
        },
        root_failed: true,
    }
}
