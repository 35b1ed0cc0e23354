//! Error types for Clipferry.
//!
//! This module provides a unified error type for all Clipferry operations,
//! with specific error variants for different failure modes.
//!
//! Per-frame problems (foreign clipboard text, malformed frames, checksum
//! failures) are not errors: they are reported as
//! [`Rejection`](crate::codec::Rejection) values and never unwind a loop.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Clipferry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Clipferry.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value (E001)
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfiguration {
        /// Configuration key or CLI flag
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A frame disagreed with the session it was folded into (E002)
    #[error("session mismatch on {field}: expected {expected}, got {actual}")]
    SessionMismatch {
        /// Which piece of session metadata disagreed
        field: &'static str,
        /// Value resolved from the session
        expected: String,
        /// Value carried by the offending frame
        actual: String,
    },

    /// No accepted frame within the configured window (E003)
    #[error("no progress for more than {0} seconds")]
    Timeout(u64),

    /// Clipboard access failed (E004)
    #[error("clipboard error: {0}")]
    ClipboardAccess(String),

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Invalid path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfiguration`].
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidConfiguration { .. } => Some("E001"),
            Self::SessionMismatch { .. } => Some("E002"),
            Self::Timeout(_) => Some("E003"),
            Self::ClipboardAccess(_) => Some("E004"),
            _ => None,
        }
    }

    /// Returns whether this error is transient and worth retrying.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ClipboardAccess(_))
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Timeout(_) => Some(
                "The partial output was kept. Restart the sender and resume with:\n\
                   clipferry receive <output> --append",
            ),
            Self::SessionMismatch { .. } => Some(
                "Another transfer overwrote the clipboard mid-session.\n\
                 Make sure only one sender is running, then retry with --append.",
            ),
            Self::ClipboardAccess(_) => Some(
                "Check that a display server is reachable (DISPLAY or WAYLAND_DISPLAY on Linux)\n\
                 and that no other program is holding the clipboard open.",
            ),
            Self::InvalidConfiguration { .. } => Some(
                "Chunk sizes accept a byte count or a k/m/g suffix (e.g. 512k, 4m).\n\
                 Intervals must be greater than zero.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::invalid_config("chunk", "bad").code(), Some("E001"));
        assert_eq!(Error::Timeout(30).code(), Some("E003"));
        assert_eq!(Error::ConfigError("x".into()).code(), None);
    }

    #[test]
    fn test_only_clipboard_errors_are_recoverable() {
        assert!(Error::ClipboardAccess("locked".into()).is_recoverable());
        assert!(!Error::Timeout(5).is_recoverable());
        assert!(!Error::SessionMismatch {
            field: "filename",
            expected: "a".into(),
            actual: "b".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_mismatch_message() {
        let err = Error::SessionMismatch {
            field: "file_size",
            expected: "10".into(),
            actual: "12".into(),
        };
        assert_eq!(
            err.to_string(),
            "session mismatch on file_size: expected 10, got 12"
        );
    }
}
