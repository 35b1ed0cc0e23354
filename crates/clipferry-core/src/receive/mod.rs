//! Receiver polling loop.
//!
//! [`Receiver`] reads the clipboard once per interval, feeds each snapshot to
//! its [`Session`], and carries out what the session decides: opening the
//! output, writing chunks at their offsets, keeping the resume journal
//! current, and finalizing the file once every chunk is on disk.
//!
//! ## Example
//!
//! ```rust,ignore
//! use clipferry_core::clipboard::create_clipboard;
//! use clipferry_core::clock::TokioClock;
//! use clipferry_core::receive::{ReceiveConfig, Receiver};
//!
//! let receiver = Receiver::new(ReceiveConfig::default(), create_clipboard()?, TokioClock)?;
//! let outcome = receiver.run().await?;
//! println!("wrote {}", outcome.path.display());
//! ```

pub mod journal;
pub mod session;

pub use journal::{journal_path, Journal, JOURNAL_SUFFIX};
pub use session::{ReceiveState, Session, SessionInfo, Step};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::clipboard::{ClipboardAccess, RetryPolicy};
use crate::clock::{delay_to_boundary, Clock};
use crate::codec::Frame;
use crate::error::{Error, Result};
use crate::file::{format_size, resolve_output, ChunkWriter};

/// Receiver options.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Explicit output path; overrides the advertised filename
    pub output: Option<PathBuf>,
    /// Directory for the advertised filename when `output` is not set
    pub out_dir: PathBuf,
    /// Pause between two clipboard reads
    pub interval: Duration,
    /// Stop after this long without progress (zero waits forever)
    pub timeout: Duration,
    /// Reuse the existing output and resume journal instead of truncating
    pub append: bool,
    /// Force the chunk count instead of taking it from the first frame
    pub expected_total: Option<u32>,
    /// Poll half way between wall-clock multiples of `interval`
    pub align: bool,
    /// Retry policy for clipboard operations
    pub retry: RetryPolicy,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            output: None,
            out_dir: PathBuf::from("."),
            interval: crate::DEFAULT_POLL_INTERVAL,
            timeout: Duration::ZERO,
            append: false,
            expected_total: None,
            align: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ReceiveConfig {
    /// Reject options that cannot produce a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a zero interval or a zero
    /// expected total.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_config("interval", "must be greater than 0"));
        }
        if self.expected_total == Some(0) {
            return Err(Error::invalid_config("expect-total", "must be at least 1"));
        }
        Ok(())
    }
}

/// Progress information for a receive.
#[derive(Debug, Clone)]
pub struct ReceiveProgress {
    /// Current state
    pub state: ReceiveState,
    /// Name advertised by the sender
    pub filename: Option<String>,
    /// Where the output is being written
    pub output: Option<PathBuf>,
    /// Chunks on disk, restored ones included
    pub received: u32,
    /// Chunks in the transfer, once known
    pub total: Option<u32>,
    /// Size of the file, once known
    pub file_size: Option<u64>,
    /// Chunk bytes written by this run
    pub bytes_written: u64,
    /// Index of the last chunk written
    pub last_index: Option<u32>,
    /// CRC-32 of the last chunk written
    pub last_crc: Option<u32>,
    /// Average write rate in bytes per second
    pub speed_bps: u64,
}

impl ReceiveProgress {
    fn new(expected_total: Option<u32>) -> Self {
        Self {
            state: ReceiveState::WaitingFirstFrame,
            filename: None,
            output: None,
            received: 0,
            total: expected_total,
            file_size: None,
            bytes_written: 0,
            last_index: None,
            last_crc: None,
            speed_bps: 0,
        }
    }
}

/// Result of a completed receive.
#[derive(Debug, Clone)]
pub struct ReceiveOutcome {
    /// Output file
    pub path: PathBuf,
    /// Final size in bytes
    pub file_size: u64,
    /// Number of chunks in the transfer
    pub chunks: u32,
    /// Chunks that were already on disk from an earlier run
    pub resumed: usize,
    /// Time from the first poll to completion
    pub elapsed: Duration,
}

/// Polls the clipboard and reassembles a file.
pub struct Receiver<C, K> {
    config: ReceiveConfig,
    clipboard: C,
    clock: K,
    session: Session,
    writer: Option<ChunkWriter>,
    journal_path: Option<PathBuf>,
    resumed: usize,
    progress_tx: watch::Sender<ReceiveProgress>,
    progress_rx: watch::Receiver<ReceiveProgress>,
}

impl<C: ClipboardAccess, K: Clock> Receiver<C, K> {
    /// Create a receiver. Nothing is opened until the first frame arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the options are invalid.
    pub fn new(config: ReceiveConfig, clipboard: C, clock: K) -> Result<Self> {
        config.validate()?;
        let session = Session::new(config.expected_total, config.timeout, clock.now());
        let (progress_tx, progress_rx) = watch::channel(ReceiveProgress::new(config.expected_total));

        Ok(Self {
            config,
            clipboard,
            clock,
            session,
            writer: None,
            journal_path: None,
            resumed: 0,
            progress_tx,
            progress_rx,
        })
    }

    /// Get a progress receiver.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<ReceiveProgress> {
        self.progress_rx.clone()
    }

    /// The session state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Poll until the file is complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::SessionMismatch`] when the
    /// session ends without completing (the partial output and journal stay
    /// on disk), [`Error::ClipboardAccess`] once clipboard reads keep failing,
    /// or an I/O error from the output file.
    pub async fn run(mut self) -> Result<ReceiveOutcome> {
        tracing::info!(
            "Polling the clipboard every {:?}{}",
            self.config.interval,
            if self.config.timeout.is_zero() {
                String::new()
            } else {
                format!(", giving up after {:?} without progress", self.config.timeout)
            }
        );

        loop {
            if self.config.align {
                let delay = delay_to_boundary(
                    self.clock.unix_time(),
                    self.config.interval,
                    self.config.interval / 2,
                );
                self.clock.sleep(delay).await;
            }

            if let Some(outcome) = self.poll_once().await? {
                return Ok(outcome);
            }

            if !self.config.align {
                self.clock.sleep(self.config.interval).await;
            }
        }
    }

    /// Run one tick: read the clipboard and act on it.
    ///
    /// Returns the outcome once the transfer completes.
    ///
    /// # Errors
    ///
    /// Same as [`Receiver::run`].
    pub async fn poll_once(&mut self) -> Result<Option<ReceiveOutcome>> {
        let retry = self.config.retry;
        let snapshot = retry.read(&mut self.clipboard, &self.clock).await?;
        let now = self.clock.now();

        let step = match self.session.observe(snapshot.as_deref(), now) {
            Ok(Step::First(frame)) => self.start(frame, now).await,
            other => other,
        };
        let step = match step {
            Ok(step) => step,
            Err(e) => {
                self.publish();
                return Err(e);
            }
        };

        match step {
            Step::Write { frame, offset } => self.write(frame, offset).await?,
            Step::Idle => tracing::trace!("Clipboard unchanged"),
            _ => {}
        }

        if self.session.state() == ReceiveState::Complete {
            return self.finish().await.map(Some);
        }
        Ok(None)
    }

    async fn start(&mut self, frame: Frame, now: Instant) -> Result<Step> {
        let path = resolve_output(
            self.config.output.as_deref(),
            &self.config.out_dir,
            &frame.filename,
        )?;
        let journal_path = journal_path(&path);

        let resume = if self.config.append {
            match journal::load(&journal_path).await {
                Ok(journal) => journal,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable resume journal: {}", e);
                    None
                }
            }
        } else {
            journal::delete(&journal_path).await?;
            None
        };

        let writer = if self.config.append {
            ChunkWriter::open_resumable(path.clone(), frame.file_size).await?
        } else {
            ChunkWriter::create(path.clone(), frame.file_size).await?
        };
        tracing::info!("Writing to {}", path.display());

        self.writer = Some(writer);
        self.journal_path = Some(journal_path);

        let step = self.session.begin(frame, resume.as_ref(), now)?;
        self.resumed = self.session.received().len();

        self.progress_tx.send_modify(|p| {
            p.output = Some(path);
        });
        self.publish();
        Ok(step)
    }

    async fn write(&mut self, frame: Frame, offset: u64) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::InvalidPath("output file is not open".to_string()));
        };
        writer.write_at(offset, &frame.data).await?;

        let done = self.session.commit(frame.sequence_index, frame.data.len());
        if !done {
            self.save_journal().await;
        }

        tracing::debug!(
            "[{}/{}] chunk {} written at {} ({}), crc32={:08X}",
            self.session.received().len(),
            frame.total_chunks,
            frame.sequence_index,
            offset,
            format_size(frame.data.len() as u64),
            frame.checksum
        );

        self.progress_tx.send_modify(|p| {
            p.last_index = Some(frame.sequence_index);
            p.last_crc = Some(frame.checksum);
        });
        self.publish();
        Ok(())
    }

    async fn save_journal(&self) {
        let (Some(path), Some(journal)) = (self.journal_path.as_ref(), self.session.journal())
        else {
            return;
        };
        if let Err(e) = journal::save(path, &journal).await {
            tracing::warn!("Failed to update resume journal: {}", e);
        }
    }

    async fn finish(&mut self) -> Result<ReceiveOutcome> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::InvalidPath("output file is not open".to_string()))?;
        let path = writer.finalize().await?;

        if let Some(journal_path) = self.journal_path.take() {
            journal::delete(&journal_path).await?;
        }

        let info = self.session.info().cloned();
        let (file_size, chunks) = info.map_or((0, 0), |i| (i.file_size, i.total_chunks));
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(self.session.started_at());

        tracing::info!(
            "Received {} ({}) in {:.1}s",
            path.display(),
            format_size(file_size),
            elapsed.as_secs_f64()
        );
        self.publish();

        Ok(ReceiveOutcome {
            path,
            file_size,
            chunks,
            resumed: self.resumed,
            elapsed,
        })
    }

    /// Push the session's view into the progress channel.
    fn publish(&self) {
        let session = &self.session;
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(session.started_at())
            .as_secs_f64();

        self.progress_tx.send_modify(|p| {
            p.state = session.state();
            p.received = u32::try_from(session.received().len()).unwrap_or(u32::MAX);
            p.total = session.expected_total();
            p.bytes_written = session.bytes_written();
            if let Some(info) = session.info() {
                p.filename = Some(info.filename.clone());
                p.file_size = Some(info.file_size);
            }
            if elapsed > 0.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    p.speed_bps = (session.bytes_written() as f64 / elapsed) as u64;
                }
            }
        });
    }
}
