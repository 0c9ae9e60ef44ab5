//! In-memory entry trees.
//!
//! [`MemEntry`] implements [`FsEntry`] over a tree built in code. Useful for
//! content that never touches the disk (generated files, archive members)
//! and for exercising the traverser with deterministic failures.

use crate::candidate::CandidateFile;
use crate::error::EntryError;
use crate::pipeline::entry::{EntryKind, FsEntry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
enum Node {
    Dir(Vec<MemEntry>),
    File { declared_type: String, bytes: Vec<u8> },
    Special,
    BrokenDir(String),
    BrokenFile(String),
}

/// A node of an in-memory tree. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemEntry {
    name: Arc<str>,
    node: Arc<Node>,
    delay: Option<Duration>,
}

impl MemEntry {
    fn with(name: &str, node: Node) -> Self {
        Self {
            name: Arc::from(name),
            node: Arc::new(node),
            delay: None,
        }
    }

    pub fn dir(name: &str, children: Vec<MemEntry>) -> Self {
        Self::with(name, Node::Dir(children))
    }

    pub fn file(name: &str, declared_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self::with(
            name,
            Node::File {
                declared_type: declared_type.to_string(),
                bytes: bytes.into(),
            },
        )
    }

    /// Neither a container nor a leaf.
    pub fn special(name: &str) -> Self {
        Self::with(name, Node::Special)
    }

    /// A container whose enumeration fails with `reason`.
    pub fn broken_dir(name: &str, reason: &str) -> Self {
        Self::with(name, Node::BrokenDir(reason.to_string()))
    }

    /// A leaf whose resolution fails with `reason`.
    pub fn broken_file(name: &str, reason: &str) -> Self {
        Self::with(name, Node::BrokenFile(reason.to_string()))
    }

    /// Make every I/O call on this node wait `delay` first.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl FsEntry for MemEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntryKind {
        match *self.node {
            Node::Dir(_) | Node::BrokenDir(_) => EntryKind::Container,
            Node::File { .. } | Node::BrokenFile(_) => EntryKind::Leaf,
            Node::Special => EntryKind::Neither,
        }
    }

    async fn read_children(&self) -> Result<Vec<Self>, EntryError> {
        self.pause().await;
        match &*self.node {
            Node::Dir(children) => Ok(children.clone()),
            Node::BrokenDir(reason) => Err(EntryError::ReadDirFailed {
                name: self.name.to_string(),
                detail: reason.clone(),
            }),
            _ => Ok(Vec::new()),
        }
    }

    async fn resolve(&self) -> Result<CandidateFile, EntryError> {
        self.pause().await;
        match &*self.node {
            Node::File {
                declared_type,
                bytes,
            } => Ok(CandidateFile::from_bytes(
                self.name.to_string(),
                declared_type.clone(),
                bytes.clone(),
            )),
            Node::BrokenFile(reason) => Err(EntryError::ResolveFailed {
                name: self.name.to_string(),
                detail: reason.clone(),
            }),
            _ => Err(EntryError::ResolveFailed {
                name: self.name.to_string(),
                detail: "not a file".into(),
            }),
        }
    }
}
