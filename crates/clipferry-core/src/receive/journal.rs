//! Resume journal for interrupted receives.
//!
//! The journal sits next to the output file as `<output>.clipferry-resume`
//! and mirrors the session's received set, so a later `--append` run can pick
//! up where a timed-out or interrupted one stopped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

use super::session::SessionInfo;

/// Suffix appended to the output file name.
pub const JOURNAL_SUFFIX: &str = ".clipferry-resume";

/// On-disk snapshot of a receive session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// Filename advertised by the sender
    pub filename: String,
    /// Size of the whole file
    pub file_size: u64,
    /// Number of chunks in the session
    pub total_chunks: u32,
    /// Uniform chunk length, once known
    pub chunk_len: Option<u64>,
    /// Sequence indices already written to the output
    pub received: BTreeSet<u32>,
    /// Last time the journal was written
    pub updated_at: DateTime<Utc>,
}

impl Journal {
    /// Whether this journal describes the same transfer as `info`.
    #[must_use]
    pub fn matches(&self, info: &SessionInfo) -> bool {
        self.filename == info.filename
            && self.file_size == info.file_size
            && self.total_chunks == info.total_chunks
    }
}

/// Journal path for an output file.
#[must_use]
pub fn journal_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(JOURNAL_SUFFIX);
    output.with_file_name(name)
}

/// Write the journal atomically (temp file, sync, rename).
///
/// # Errors
///
/// Returns an error if the journal cannot be serialized or written.
pub async fn save(path: &Path, journal: &Journal) -> Result<()> {
    let json = serde_json::to_string_pretty(journal)
        .map_err(|e| Error::Serialization(format!("Failed to serialize resume journal: {e}")))?;

    let mut temp_path = path.as_os_str().to_os_string();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;

    tracing::trace!(
        path = %path.display(),
        received = journal.received.len(),
        "Saved resume journal"
    );

    Ok(())
}

/// Load a journal if one exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load(path: &Path) -> Result<Option<Journal>> {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let journal: Journal = serde_json::from_str(&contents)
        .map_err(|e| Error::Serialization(format!("Failed to parse resume journal: {e}")))?;

    tracing::debug!(
        path = %path.display(),
        received = journal.received.len(),
        "Loaded resume journal"
    );

    Ok(Some(journal))
}

/// Delete the journal if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be deleted.
pub async fn delete(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Deleted resume journal");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
