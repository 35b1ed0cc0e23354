//! # Clipferry Core Library
//!
//! `clipferry-core` moves a file between two programs that share nothing but
//! a text clipboard, such as the two ends of a remote desktop session with
//! file transfer disabled.
//!
//! ## How it works
//!
//! The sender splits the file into chunks and writes each one to the
//! clipboard as a self-describing text frame, one frame per interval. The
//! receiver polls the clipboard, validates whatever it finds, and writes each
//! new chunk at its offset in the output file. Clipboard text that is not a
//! frame is ignored, and a frame seen twice is written once.
//!
//! ## Modules
//!
//! - [`clipboard`] - Clipboard access, in-memory clipboard, retry policy
//! - [`clock`] - Time source shared by both loops
//! - [`codec`] - Frame encoding, chunking, validation
//! - [`config`] - Configuration management
//! - [`mod@file`] - Source reading and positional output writes
//! - [`receive`] - Receiver session state machine and polling loop
//! - [`send`] - Sender loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use clipferry_core::clipboard::create_clipboard;
//! use clipferry_core::clock::TokioClock;
//! use clipferry_core::send::{SendConfig, Sender};
//!
//! let clipboard = create_clipboard()?;
//! let sender = Sender::open("report.pdf", SendConfig::default(), clipboard, TokioClock).await?;
//! sender.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod clipboard;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod receive;
pub mod send;

pub use error::{Error, Result};

use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chunk size (4 MiB of file bytes per frame)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default pause between two sender clipboard writes
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(10);

/// Default pause between two receiver clipboard reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
