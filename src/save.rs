//! Writing the converted result to disk.

use crate::error::DeckDropError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reduce a server-suggested name to a bare filename.
///
/// Directory components are dropped so a hostile header cannot write outside
/// the output directory. Returns `None` if nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Write `bytes` to `dir/filename`.
///
/// Uses atomic write (temp file in the same directory + rename) so a reader
/// never sees a partial file. An existing file with the same name is
/// replaced. `filename` must already be sanitized.
pub async fn save_result(dir: &Path, filename: &str, bytes: Vec<u8>) -> Result<PathBuf, DeckDropError> {
    let path = dir.join(filename);
    let write_failed = |source: std::io::Error| DeckDropError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_failed)?;

    let dir_owned = dir.to_path_buf();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir_owned)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| DeckDropError::Internal(format!("Save task panicked: {e}")))?
    .map_err(write_failed)?;

    info!("Saved result to {}", path.display());
    Ok(path)
}
