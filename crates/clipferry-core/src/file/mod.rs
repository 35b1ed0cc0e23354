//! File operations for Clipferry.
//!
//! This module handles:
//! - Reading the source file on the sending side
//! - Choosing a safe output path from an advertised filename
//! - Positional writes into the output file on the receiving side

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// A source file loaded for sending.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path the file was read from
    pub path: PathBuf,
    /// Name advertised in every frame
    pub name: String,
    /// File contents
    pub data: Vec<u8>,
}

impl SourceFile {
    /// Read a file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] if the path does not exist,
    /// [`Error::InvalidPath`] if it is not a regular file, or an I/O error.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "clipferry.bin".to_string(), |n| n.to_string_lossy().into_owned());

        tracing::debug!("Read {} ({} bytes)", path.display(), data.len());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            data,
        })
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Sanitize a path to prevent directory traversal attacks.
///
/// # Arguments
///
/// * `base` - Base directory
/// * `relative` - Relative path from base
///
/// # Returns
///
/// The sanitized absolute path, or None if the path is invalid.
#[must_use]
pub fn sanitize_path(base: &Path, relative: &Path) -> Option<PathBuf> {
    for component in relative.components() {
        if !matches!(component, Component::Normal(_)) {
            return None;
        }
    }

    let full_path = base.join(relative);

    if full_path.starts_with(base) {
        Some(full_path)
    } else {
        None
    }
}

/// Reduce an advertised filename to a single safe path component.
///
/// Directory parts from either separator style are dropped, as are control
/// characters. Returns `None` if nothing usable is left.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Pick the output path for a transfer.
///
/// An explicit path wins; otherwise the sanitized advertised filename is
/// placed inside `out_dir`.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if no explicit path is given and the
/// advertised name cannot be made safe.
pub fn resolve_output(explicit: Option<&Path>, out_dir: &Path, advertised: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    sanitize_filename(advertised)
        .and_then(|name| sanitize_path(out_dir, Path::new(&name)))
        .ok_or_else(|| {
            Error::InvalidPath(format!(
                "advertised filename '{advertised}' is not usable, pass an output path"
            ))
        })
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Writer that places chunks at arbitrary offsets in the output file.
#[derive(Debug)]
pub struct ChunkWriter {
    /// Output file path
    pub output_path: PathBuf,
    /// Expected total file size
    pub expected_size: u64,
    /// File handle
    file: File,
}

impl ChunkWriter {
    /// Create the output file, truncating anything already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub async fn create(output_path: PathBuf, expected_size: u64) -> Result<Self> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = File::create(&output_path).await?;
        file.set_len(expected_size).await?;

        tracing::debug!(
            "Created {} ({} bytes reserved)",
            output_path.display(),
            expected_size
        );

        Ok(Self {
            output_path,
            expected_size,
            file,
        })
    }

    /// Open the output file without truncating it.
    ///
    /// The file is extended to the expected size if it is shorter; existing
    /// bytes are kept so a resumed session only fills in what is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open_resumable(output_path: PathBuf, expected_size: u64) -> Result<Self> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&output_path)
            .await?;

        let metadata = file.metadata().await?;
        if metadata.len() < expected_size {
            file.set_len(expected_size).await?;
        }

        Ok(Self {
            output_path,
            expected_size,
            file,
        })
    }

    /// Write `data` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the write would run past the expected
    /// size, or an I/O error if seek or write fails.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.saturating_add(data.len() as u64);
        if end > self.expected_size {
            return Err(Error::InvalidPath(format!(
                "write of {} bytes at {offset} runs past the end of {} ({} bytes)",
                data.len(),
                self.output_path.display(),
                self.expected_size
            )));
        }

        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        // Chunks are journaled as written right after this returns.
        self.file.flush().await?;

        Ok(())
    }

    /// Trim or extend the file to its expected size, flush and sync it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be resized or synced.
    pub async fn finalize(mut self) -> Result<PathBuf> {
        self.file.flush().await?;
        self.file.set_len(self.expected_size).await?;
        self.file.sync_all().await?;
        Ok(self.output_path)
    }
}
