//! Entry classification: decide container vs. leaf, resolve leaves.
//!
//! [`FsEntry`] is the seam to whatever supplies the dropped tree. The
//! traverser only ever talks to this trait, so the same walk runs over the
//! local filesystem ([`LocalEntry`]), an in-memory tree
//! ([`crate::pipeline::memory::MemEntry`]) or anything else that can list
//! children and resolve files.
//!
//! Classification never applies the allow-list; every leaf is resolved and
//! the decision is left to [`crate::pipeline::validate`].

use crate::candidate::{CandidateFile, FileContent};
use crate::error::EntryError;
use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, warn};

/// What an entry denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Container,
    Leaf,
    Neither,
}

/// A node of a dropped tree.
#[async_trait]
pub trait FsEntry: Send + Sync + Sized + 'static {
    /// Display name (last path component).
    fn name(&self) -> &str;

    fn kind(&self) -> EntryKind;

    /// Immediate children of a container.
    async fn read_children(&self) -> Result<Vec<Self>, EntryError>;

    /// Resolve a leaf to metadata plus a content handle.
    async fn resolve(&self) -> Result<CandidateFile, EntryError>;

    /// Stable identity of the directory a container points at.
    ///
    /// The walk skips a container whose identity matches one of its
    /// ancestors. Sources that cannot form cycles keep the default.
    fn identity(&self) -> Option<&Path> {
        None
    }
}

/// Result of classifying one entry.
#[derive(Debug)]
pub enum Classified<E> {
    /// Enumerate its children next.
    Container(E),
    LeafResolved(CandidateFile),
    Ignored,
}

/// Classify one entry, resolving it if it is a leaf.
///
/// A resolution failure is returned for this entry only.
pub async fn classify<E: FsEntry>(entry: E) -> Result<Classified<E>, EntryError> {
    match entry.kind() {
        EntryKind::Container => Ok(Classified::Container(entry)),
        EntryKind::Leaf => entry.resolve().await.map(Classified::LeafResolved),
        EntryKind::Neither => {
            debug!("Ignoring '{}': neither file nor directory", entry.name());
            Ok(Classified::Ignored)
        }
    }
}

/// Resolve a flat list of picked entries without traversal.
///
/// Containers and special entries are skipped, as are leaves that fail to
/// resolve. All resolutions run concurrently; output keeps input order.
pub async fn pick<E: FsEntry>(entries: Vec<E>) -> Vec<CandidateFile> {
    let resolved = join_all(entries.into_iter().map(|entry| async move {
        if entry.kind() != EntryKind::Leaf {
            debug!("Pick skips '{}': not a file", entry.name());
            return None;
        }
        match entry.resolve().await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Pick skips {e}");
                None
            }
        }
    }))
    .await;
    resolved.into_iter().flatten().collect()
}

/// [`pick`] over local paths. Paths that cannot be opened are skipped.
pub async fn pick_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<CandidateFile> {
    let opened = join_all(paths.iter().map(|p| LocalEntry::open(p.as_ref()))).await;
    let entries: Vec<LocalEntry> = opened
        .into_iter()
        .filter_map(|r| r.map_err(|e| warn!("Pick skips {e}")).ok())
        .collect();
    pick(entries).await
}

// ── Local filesystem ─────────────────────────────────────────────────────

/// An entry of the local filesystem, backed by `tokio::fs`.
///
/// Symbolic links are followed; broken links and special files
/// (sockets, FIFOs, devices) are [`EntryKind::Neither`]. Directories carry
/// their canonical path as [`FsEntry::identity`], so a link back to an
/// enclosing directory is not entered again.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    path: PathBuf,
    name: String,
    kind: EntryKind,
    canonical: Option<PathBuf>,
}

impl LocalEntry {
    /// Stat `path` and build an entry for it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, EntryError> {
        let path = path.as_ref().to_path_buf();
        let name = display_name(&path);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EntryError::NotFound { name: name.clone() }
            } else {
                EntryError::ResolveFailed {
                    name: name.clone(),
                    detail: e.to_string(),
                }
            }
        })?;
        let kind = kind_of(&metadata);
        Ok(Self {
            canonical: canonical_dir(&path, kind).await,
            kind,
            path,
            name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn from_dir_entry(entry: tokio::fs::DirEntry) -> Self {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        // `DirEntry::metadata` does not traverse symlinks; `fs::metadata` does.
        let kind = match tokio::fs::metadata(&path).await {
            Ok(m) => kind_of(&m),
            Err(e) => {
                debug!("Cannot stat '{}': {e}", path.display());
                EntryKind::Neither
            }
        };
        Self {
            canonical: canonical_dir(&path, kind).await,
            path,
            name,
            kind,
        }
    }
}

async fn canonical_dir(path: &Path, kind: EntryKind) -> Option<PathBuf> {
    if kind != EntryKind::Container {
        return None;
    }
    match tokio::fs::canonicalize(path).await {
        Ok(p) => Some(p),
        Err(e) => {
            debug!("Cannot canonicalize '{}': {e}", path.display());
            None
        }
    }
}

#[async_trait]
impl FsEntry for LocalEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntryKind {
        self.kind
    }

    fn identity(&self) -> Option<&Path> {
        self.canonical.as_deref()
    }

    async fn read_children(&self) -> Result<Vec<Self>, EntryError> {
        let read_dir_failed = |e: std::io::Error| EntryError::ReadDirFailed {
            name: self.name.clone(),
            detail: e.to_string(),
        };

        let read_dir = tokio::fs::read_dir(&self.path)
            .await
            .map_err(read_dir_failed)?;
        let dir_entries: Vec<tokio::fs::DirEntry> = ReadDirStream::new(read_dir)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .map_err(read_dir_failed)?;

        debug!("'{}': {} children", self.path.display(), dir_entries.len());
        Ok(join_all(dir_entries.into_iter().map(Self::from_dir_entry)).await)
    }

    async fn resolve(&self) -> Result<CandidateFile, EntryError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EntryError::NotFound {
                    name: self.name.clone(),
                }
            } else {
                EntryError::ResolveFailed {
                    name: self.name.clone(),
                    detail: e.to_string(),
                }
            }
        })?;
        if !metadata.is_file() {
            return Err(EntryError::ResolveFailed {
                name: self.name.clone(),
                detail: "not a regular file".into(),
            });
        }

        Ok(CandidateFile::new(
            self.name.clone(),
            metadata.len(),
            declared_type_for(&self.path),
            FileContent::OnDisk(self.path.clone()),
        ))
    }
}

/// Media type a browser would report for this filename; empty when unknown.
pub fn declared_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default()
}

fn kind_of(metadata: &std::fs::Metadata) -> EntryKind {
    if metadata.is_dir() {
        EntryKind::Container
    } else if metadata.is_file() {
        EntryKind::Leaf
    } else {
        EntryKind::Neither
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
