//! Receiver bookkeeping.
//!
//! [`Session`] holds everything the receiver knows about a transfer and
//! decides, for each clipboard snapshot, what should happen. It performs no
//! I/O: the caller writes the chunk the session points at and then reports it
//! with [`Session::commit`].
//!
//! ```text
//! WaitingFirstFrame ──first frame──> Receiving ──all chunks──> Complete
//!        │                              │  │
//!        └──────────timeout─────────────┤  └──metadata/geometry conflict──> Mismatch
//!                                       v
//!                                    TimedOut
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::clipboard::fingerprint;
use crate::codec::{validate, Frame, Rejection};
use crate::error::{Error, Result};

use super::journal::Journal;

/// Receiver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    /// No frame accepted yet
    WaitingFirstFrame,
    /// At least one frame accepted
    Receiving,
    /// Every chunk written
    Complete,
    /// No progress within the timeout
    TimedOut,
    /// A frame contradicted the session
    Mismatch,
}

impl ReceiveState {
    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::TimedOut | Self::Mismatch)
    }
}

/// Metadata fixed by the first accepted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Filename advertised by the sender
    pub filename: String,
    /// Size of the whole file
    pub file_size: u64,
    /// Number of chunks
    pub total_chunks: u32,
}

impl SessionInfo {
    fn of(frame: &Frame) -> Self {
        Self {
            filename: frame.filename.clone(),
            file_size: frame.file_size,
            total_chunks: frame.total_chunks,
        }
    }
}

/// Outcome of one [`Session::observe`] call.
#[derive(Debug)]
pub enum Step {
    /// Clipboard empty or unchanged since the last tick
    Idle,
    /// New clipboard text that is not an acceptable frame
    Ignored(Rejection),
    /// A valid frame carrying a different total than the one forced by the
    /// operator
    WrongTotal {
        /// Forced total
        expected: u32,
        /// Total carried by the frame
        actual: u32,
    },
    /// First accepted frame; pass it to [`Session::begin`] once the output is
    /// ready
    First(Frame),
    /// Chunk already written
    Duplicate(u32),
    /// Write `frame.data` at `offset`, then [`Session::commit`] it
    Write {
        /// The accepted frame
        frame: Frame,
        /// Byte offset in the output file
        offset: u64,
    },
}

/// Receiver-side state for one transfer.
#[derive(Debug)]
pub struct Session {
    state: ReceiveState,
    expected_total: Option<u32>,
    timeout: Duration,
    info: Option<SessionInfo>,
    received: BTreeSet<u32>,
    chunk_len: Option<u64>,
    bytes_written: u64,
    last_seen: Option<u64>,
    session_start: Instant,
    last_progress: Instant,
}

impl Session {
    /// Create a session.
    ///
    /// `expected_total` forces the chunk count instead of taking it from the
    /// first frame. A zero `timeout` never expires.
    #[must_use]
    pub fn new(expected_total: Option<u32>, timeout: Duration, now: Instant) -> Self {
        Self {
            state: ReceiveState::WaitingFirstFrame,
            expected_total,
            timeout,
            info: None,
            received: BTreeSet::new(),
            chunk_len: None,
            bytes_written: 0,
            last_seen: None,
            session_start: now,
            last_progress: now,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ReceiveState {
        self.state
    }

    /// Metadata resolved from the first frame.
    #[must_use]
    pub const fn info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    /// Sequence indices written so far.
    #[must_use]
    pub const fn received(&self) -> &BTreeSet<u32> {
        &self.received
    }

    /// Chunk count the session is waiting for.
    #[must_use]
    pub fn expected_total(&self) -> Option<u32> {
        self.expected_total
            .or_else(|| self.info.as_ref().map(|i| i.total_chunks))
    }

    /// Bytes of chunk data written in this session (restored chunks excluded).
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// When the session was created.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.session_start
    }

    /// Fold one clipboard snapshot into the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionMismatch`] if a frame contradicts the session,
    /// or [`Error::Timeout`] if no frame was accepted within the timeout.
    /// Both leave the session in a terminal state.
    pub fn observe(&mut self, snapshot: Option<&str>, now: Instant) -> Result<Step> {
        if self.state.is_terminal() {
            return Ok(Step::Idle);
        }

        let Some(text) = snapshot else {
            return self.idle(Step::Idle, now);
        };

        let fp = fingerprint(text);
        if self.last_seen == Some(fp) {
            return self.idle(Step::Idle, now);
        }
        self.last_seen = Some(fp);

        let frame = match validate(text) {
            Ok(frame) => frame,
            Err(rejection) => {
                match &rejection {
                    Rejection::Foreign => tracing::debug!("Ignoring non-frame clipboard content"),
                    Rejection::Malformed(reason) => {
                        tracing::debug!("Ignoring malformed frame: {}", reason);
                    }
                    Rejection::ChecksumMismatch(reason) => {
                        tracing::warn!("Dropping frame with bad checksum: {}", reason);
                    }
                }
                return self.idle(Step::Ignored(rejection), now);
            }
        };

        if let Some(expected) = self.expected_total {
            if frame.total_chunks != expected {
                tracing::warn!(
                    "Ignoring frame {}/{}: expected {} chunks",
                    frame.sequence_index,
                    frame.total_chunks,
                    expected
                );
                let step = Step::WrongTotal {
                    expected,
                    actual: frame.total_chunks,
                };
                return self.idle(step, now);
            }
        }

        if self.state == ReceiveState::WaitingFirstFrame {
            self.last_progress = now;
            return Ok(Step::First(frame));
        }

        self.place(frame, now)
    }

    /// Start receiving with the first accepted frame.
    ///
    /// `resume` restores the received set and chunk length of an earlier run
    /// when it describes the same transfer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionMismatch`] only for a frame that did not come
    /// from [`Session::observe`] and whose geometry is impossible.
    pub fn begin(&mut self, frame: Frame, resume: Option<&Journal>, now: Instant) -> Result<Step> {
        let info = SessionInfo::of(&frame);

        let chunk_len = frame.implied_chunk_len();

        if let Some(journal) = resume {
            let same_split = journal.chunk_len.is_none() || journal.chunk_len == chunk_len;
            if journal.matches(&info) && same_split {
                self.received = journal
                    .received
                    .iter()
                    .copied()
                    .filter(|&i| i >= 1 && i <= info.total_chunks)
                    .collect();
                self.chunk_len = journal.chunk_len;
                tracing::info!(
                    "Resuming {}: {}/{} chunks already on disk",
                    info.filename,
                    self.received.len(),
                    info.total_chunks
                );
            } else {
                tracing::warn!(
                    "Resume journal describes {} ({} bytes, {} chunks of {:?}), starting fresh",
                    journal.filename,
                    journal.file_size,
                    journal.total_chunks,
                    journal.chunk_len
                );
            }
        }

        tracing::info!(
            "Receiving {} ({} bytes in {} chunks)",
            info.filename,
            info.file_size,
            info.total_chunks
        );

        self.info = Some(info);
        self.state = ReceiveState::Receiving;
        if self.is_done() {
            self.state = ReceiveState::Complete;
        }
        self.place(frame, now)
    }

    /// Record that the chunk `index` of `len` bytes is on disk.
    ///
    /// Returns `true` once every chunk has been written.
    pub fn commit(&mut self, index: u32, len: usize) -> bool {
        if self.received.insert(index) {
            self.bytes_written += len as u64;
        }
        if self.is_done() {
            self.state = ReceiveState::Complete;
            tracing::info!("All {} chunks received", self.received.len());
            return true;
        }
        false
    }

    /// Snapshot the session for the resume journal.
    #[must_use]
    pub fn journal(&self) -> Option<Journal> {
        self.info.as_ref().map(|info| Journal {
            filename: info.filename.clone(),
            file_size: info.file_size,
            total_chunks: info.total_chunks,
            chunk_len: self.chunk_len,
            received: self.received.clone(),
            updated_at: chrono::Utc::now(),
        })
    }

    /// Check the timeout without a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the session has stalled.
    pub fn check_timeout(&mut self, now: Instant) -> Result<()> {
        if self.state.is_terminal() || self.timeout.is_zero() {
            return Ok(());
        }
        if now.saturating_duration_since(self.last_progress) > self.timeout {
            self.state = ReceiveState::TimedOut;
            tracing::warn!(
                "No progress for {:?} ({} chunks received)",
                self.timeout,
                self.received.len()
            );
            return Err(Error::Timeout(self.timeout.as_secs()));
        }
        Ok(())
    }

    fn idle(&mut self, step: Step, now: Instant) -> Result<Step> {
        self.check_timeout(now)?;
        Ok(step)
    }

    fn is_done(&self) -> bool {
        self.expected_total()
            .is_some_and(|total| self.received.len() >= total as usize)
    }

    fn place(&mut self, frame: Frame, now: Instant) -> Result<Step> {
        let Some(info) = self.info.clone() else {
            return Ok(Step::First(frame));
        };

        if frame.filename != info.filename {
            return Err(self.mismatch("filename", &info.filename, &frame.filename));
        }
        if frame.file_size != info.file_size {
            return Err(self.mismatch("file size", info.file_size, frame.file_size));
        }
        if frame.total_chunks != info.total_chunks {
            return Err(self.mismatch("total chunks", info.total_chunks, frame.total_chunks));
        }

        let index = frame.sequence_index;
        if self.received.contains(&index) {
            tracing::debug!("Chunk {}/{} already written", index, info.total_chunks);
            self.last_progress = now;
            return Ok(Step::Duplicate(index));
        }

        let offset = self.offset_of(&frame, &info)?;
        self.last_progress = now;
        Ok(Step::Write { frame, offset })
    }

    /// Offset of a chunk, learning the chunk length from it when possible.
    fn offset_of(&mut self, frame: &Frame, info: &SessionInfo) -> Result<u64> {
        let len = frame.data.len() as u64;
        let index = u64::from(frame.sequence_index);

        let Some(implied) = frame.implied_chunk_len() else {
            return Err(self.mismatch(
                "chunk length",
                format!("a length fitting {} bytes in {} chunks", info.file_size, info.total_chunks),
                len,
            ));
        };

        if info.total_chunks == 1 {
            return Ok(0);
        }

        match self.chunk_len {
            Some(known) if known != implied => {
                return Err(self.mismatch("chunk length", known, implied));
            }
            Some(_) => {}
            None => {
                tracing::debug!("Learned chunk length {} from chunk {}", implied, index);
                self.chunk_len = Some(implied);
            }
        }

        if frame.is_last() {
            Ok(info.file_size - len)
        } else {
            Ok((index - 1) * implied)
        }
    }

    fn mismatch(
        &mut self,
        field: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Error {
        self.state = ReceiveState::Mismatch;
        let err = Error::SessionMismatch {
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        };
        tracing::warn!("{}", err);
        err
    }
}
