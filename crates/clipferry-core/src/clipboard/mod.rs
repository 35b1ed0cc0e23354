//! Clipboard transport.
//!
//! The protocol only needs two operations from the platform clipboard: read
//! the current text and replace it. [`ClipboardAccess`] captures exactly that,
//! so the send and receive loops run unchanged against the real clipboard
//! ([`NativeClipboard`]) or an in-memory one ([`MemoryClipboard`]).
//!
//! Platform clipboards fail transiently (another process holding the
//! clipboard open on Windows, a slow X11 selection owner). [`RetryPolicy`]
//! retries those failures with bounded exponential backoff.

pub mod access;
pub mod memory;
pub mod retry;

pub use access::{create_clipboard, diagnose_clipboard, NativeClipboard};
pub use memory::MemoryClipboard;
pub use retry::RetryPolicy;

use xxhash_rust::xxh64::xxh64;

use crate::error::Result;

/// Platform-agnostic clipboard access.
pub trait ClipboardAccess: Send {
    /// Read the current clipboard text.
    ///
    /// Returns `Ok(None)` when the clipboard is empty or holds no text.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    fn read(&mut self) -> Result<Option<String>>;

    /// Replace the clipboard content with `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    fn write(&mut self, text: &str) -> Result<()>;
}

impl<T: ClipboardAccess + ?Sized> ClipboardAccess for Box<T> {
    fn read(&mut self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&mut self, text: &str) -> Result<()> {
        (**self).write(text)
    }
}

/// xxHash64 of a clipboard snapshot, used for change detection.
#[must_use]
pub fn fingerprint(text: &str) -> u64 {
    xxh64(text.as_bytes(), 0)
}
