//! Cross-platform clipboard access.
//!
//! This module provides the native implementation of [`ClipboardAccess`]
//! using the `arboard` crate.

use arboard::Clipboard;

use crate::error::{Error, Result};

use super::ClipboardAccess;

/// Native clipboard implementation using arboard.
///
/// On X11 the process owns the selection it wrote, so the value must be kept
/// alive for as long as the content should stay on the clipboard.
pub struct NativeClipboard {
    clipboard: Clipboard,
}

impl NativeClipboard {
    /// Create a new native clipboard accessor.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard cannot be accessed.
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new()
            .map_err(|e| Error::ClipboardAccess(format!("failed to access clipboard: {e}")))?;
        Ok(Self { clipboard })
    }

    /// Verify clipboard is accessible (for early failure detection).
    ///
    /// An empty clipboard counts as accessible.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard cannot be read.
    pub fn verify_access(&mut self) -> Result<()> {
        match self.clipboard.get_text() {
            Ok(_) | Err(arboard::Error::ContentNotAvailable) => {
                tracing::trace!("Clipboard: access verified");
                Ok(())
            }
            Err(e) => {
                let msg = format!("cannot access clipboard ({e}), check display server connection");
                tracing::warn!("Clipboard: {}", msg);
                Err(Error::ClipboardAccess(msg))
            }
        }
    }
}

impl ClipboardAccess for NativeClipboard {
    fn read(&mut self) -> Result<Option<String>> {
        match self.clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => {
                tracing::trace!("Clipboard: read {} bytes of text", text.len());
                Ok(Some(text))
            }
            Err(arboard::Error::ContentNotAvailable) => {
                tracing::trace!("Clipboard: no text content");
                Ok(None)
            }
            Err(e) => Err(Error::ClipboardAccess(format!("failed to read text: {e}"))),
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text.to_owned())
            .map_err(|e| Error::ClipboardAccess(format!("failed to set text: {e}")))?;
        tracing::trace!("Clipboard: wrote {} bytes of text", text.len());
        Ok(())
    }
}

/// Describe the clipboard as a receiver would see it.
///
/// Lists the display environment on Linux, whether the clipboard can be
/// opened, and whether the text on it right now is a frame.
#[must_use]
pub fn diagnose_clipboard() -> String {
    let mut report = Vec::new();

    #[cfg(target_os = "linux")]
    {
        let wayland = std::env::var("WAYLAND_DISPLAY").ok();
        let x11 = std::env::var("DISPLAY").ok();
        match (&wayland, &x11) {
            (None, None) => report.push(
                "No display server found (neither WAYLAND_DISPLAY nor DISPLAY is set)".to_string(),
            ),
            _ => {
                if let Some(display) = wayland {
                    report.push(format!("Wayland: {display}"));
                }
                if let Some(display) = x11 {
                    report.push(format!("X11: {display}"));
                }
            }
        }
    }

    let mut clipboard = match NativeClipboard::new() {
        Ok(clipboard) => clipboard,
        Err(e) => {
            report.push(format!("Cannot open the clipboard: {e}"));
            return report.join("\n");
        }
    };

    match clipboard.read() {
        Ok(None) => report.push("Clipboard holds no text".to_string()),
        Ok(Some(text)) => {
            let summary = match crate::codec::validate(&text) {
                Ok(frame) => format!(
                    "frame {}/{} of {} ({} bytes total)",
                    frame.sequence_index, frame.total_chunks, frame.filename, frame.file_size
                ),
                Err(rejection) => rejection.to_string(),
            };
            report.push(format!("Clipboard holds {} bytes of text: {summary}", text.len()));
        }
        Err(e) => report.push(format!("Clipboard opened but cannot be read: {e}")),
    }

    report.join("\n")
}

/// Create a platform-appropriate clipboard accessor.
///
/// # Errors
///
/// Returns an error if clipboard cannot be accessed.
pub fn create_clipboard() -> Result<Box<dyn ClipboardAccess>> {
    let mut clipboard = NativeClipboard::new()?;
    clipboard.verify_access()?;
    Ok(Box::new(clipboard))
}
