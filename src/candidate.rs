//! Candidate files: what a pick or a drop produces before validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Dedup identity of a file: `(name, size)`. Not a content hash, not a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileKey {
    pub name: String,
    pub size: u64,
}

/// Opaque handle to a candidate's bytes.
///
/// On-disk content is only read when the submission request is built.
#[derive(Clone, PartialEq, Eq)]
pub enum FileContent {
    OnDisk(PathBuf),
    InMemory(Vec<u8>),
}

impl FileContent {
    /// Load the full content.
    pub async fn load(&self) -> std::io::Result<Vec<u8>> {
        match self {
            FileContent::OnDisk(path) => tokio::fs::read(path).await,
            FileContent::InMemory(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FileContent::OnDisk(p) => Some(p),
            FileContent::InMemory(_) => None,
        }
    }
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContent::OnDisk(p) => f.debug_tuple("OnDisk").field(p).finish(),
            FileContent::InMemory(b) => write!(f, "InMemory(<{} bytes>)", b.len()),
        }
    }
}

/// A file discovered via pick or drop, not yet admitted into a selection.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    name: String,
    size: u64,
    declared_type: String,
    content: FileContent,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        declared_type: impl Into<String>,
        content: FileContent,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            declared_type: declared_type.into(),
            content,
        }
    }

    /// In-memory candidate; size is taken from the bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let size = bytes.len() as u64;
        Self::new(name, size, declared_type, FileContent::InMemory(bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Media type as reported by the entry source; empty when unknown.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    pub fn key(&self) -> FileKey {
        FileKey {
            name: self.name.clone(),
            size: self.size,
        }
    }

    /// `name (12.3 KB)`, as shown in the file list.
    pub fn display_label(&self) -> String {
        format!("{} ({:.1} KB)", self.name, self.size as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_content_and_type() {
        let a = CandidateFile::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        let b = CandidateFile::from_bytes("a.png", "", vec![9, 9, 9]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn display_label_in_kilobytes() {
        let f = CandidateFile::new("deck.pdf", 2048, "application/pdf", FileContent::InMemory(vec![]));
        assert_eq!(f.display_label(), "deck.pdf (2.0 KB)");
    }

    #[tokio::test]
    async fn load_in_memory() {
        let f = CandidateFile::from_bytes("a.gif", "image/gif", b"GIF89a".to_vec());
        assert_eq!(f.content().load().await.unwrap(), b"GIF89a");
        assert!(f.content().path().is_none());
    }

    #[test]
    fn debug_hides_bytes() {
        let c = FileContent::InMemory(vec![0; 4096]);
        assert_eq!(format!("{c:?}"), "InMemory(<4096 bytes>)");
    }
}
