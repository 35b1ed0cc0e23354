//! In-memory clipboard.
//!
//! A single shared text slot with the same last-writer-wins semantics as the
//! system clipboard. Clones share the slot, so a sender and a receiver can be
//! wired to each other inside one process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

use super::ClipboardAccess;

#[derive(Debug, Default)]
struct Slot {
    text: Option<String>,
    writes: u64,
    /// Injected failures, consumed one per operation
    failures: VecDeque<String>,
}

/// Clipboard backed by a shared in-memory slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content as a third-party application would.
    pub fn set(&self, text: impl Into<String>) {
        self.lock().text = Some(text.into());
    }

    /// Clear the content.
    pub fn clear(&self) {
        self.lock().text = None;
    }

    /// Current content.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.lock().text.clone()
    }

    /// Number of successful writes through [`ClipboardAccess::write`].
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Make the next `count` operations fail with a transient error.
    pub fn fail_next(&self, count: usize, reason: &str) {
        let mut slot = self.lock();
        for _ in 0..count {
            slot.failures.push_back(reason.to_string());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn read(&mut self) -> Result<Option<String>> {
        let mut slot = self.lock();
        if let Some(reason) = slot.failures.pop_front() {
            return Err(Error::ClipboardAccess(reason));
        }
        Ok(slot.text.clone().filter(|t| !t.is_empty()))
    }

    fn write(&mut self, text: &str) -> Result<()> {
        let mut slot = self.lock();
        if let Some(reason) = slot.failures.pop_front() {
            return Err(Error::ClipboardAccess(reason));
        }
        slot.text = Some(text.to_string());
        slot.writes += 1;
        Ok(())
    }
}
