//! Sender loop.
//!
//! Publishes one frame per interval to the clipboard, in order, with no
//! feedback from the receiver. The loop is an ordinary future: dropping it
//! stops the transfer at the next suspension point and leaves whatever frame
//! was last published on the clipboard.
//!
//! ```text
//! Idle ──> Sending(1) ──> Sending(2) ──> ... ──> Sending(n) ──> Done
//!           write, sleep    write, sleep          write, sleep
//! ```

use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::clipboard::{ClipboardAccess, RetryPolicy};
use crate::clock::{delay_to_boundary, Clock};
use crate::codec;
use crate::error::{Error, Result};
use crate::file::{format_size, SourceFile};

/// Sender options.
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Bytes of file data per frame
    pub chunk_size: usize,
    /// Pause after each published frame
    pub interval: Duration,
    /// Sleep one interval before the first frame
    pub wait_first: bool,
    /// Publish on wall-clock multiples of `interval`
    pub align: bool,
    /// Read each frame back and rewrite it if the clipboard did not keep it
    pub verify_writes: bool,
    /// Retry policy for clipboard operations
    pub retry: RetryPolicy,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            interval: crate::DEFAULT_SEND_INTERVAL,
            wait_first: false,
            align: false,
            verify_writes: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl SendConfig {
    /// Reject options that cannot produce a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a zero chunk size or interval.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk", "must be greater than 0"));
        }
        if self.interval.is_zero() {
            return Err(Error::invalid_config("interval", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Sender state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Not started
    Idle,
    /// Publishing frames
    Sending,
    /// Every frame was published and held for one interval
    Done,
}

/// Progress information for a send.
#[derive(Debug, Clone)]
pub struct SendProgress {
    /// Current state
    pub state: SendState,
    /// Index of the frame most recently published (0 before the first)
    pub current: u32,
    /// Total number of frames
    pub total: u32,
    /// File bytes published so far
    pub bytes_sent: u64,
    /// Size of the file
    pub total_bytes: u64,
    /// Length of the last frame text in bytes
    pub frame_len: usize,
    /// CRC-32 of the last published chunk
    pub last_crc: u32,
    /// Average rate in file bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining
    pub eta: Option<Duration>,
}

impl SendProgress {
    fn new(total: u32, total_bytes: u64) -> Self {
        Self {
            state: SendState::Idle,
            current: 0,
            total,
            bytes_sent: 0,
            total_bytes,
            frame_len: 0,
            last_crc: 0,
            speed_bps: 0,
            eta: None,
        }
    }

    /// Fraction of the file published, in percent.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            if self.current >= self.total {
                100.0
            } else {
                0.0
            }
        } else {
            self.bytes_sent as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Publishes a file to the clipboard frame by frame.
pub struct Sender<C, K> {
    source: SourceFile,
    config: SendConfig,
    clipboard: C,
    clock: K,
    total: u32,
    progress_tx: watch::Sender<SendProgress>,
    progress_rx: watch::Receiver<SendProgress>,
}

impl<C: ClipboardAccess, K: Clock> Sender<C, K> {
    /// Prepare a send of an already loaded file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the options are invalid or
    /// the file needs more frames than the header can count.
    pub fn new(source: SourceFile, config: SendConfig, clipboard: C, clock: K) -> Result<Self> {
        config.validate()?;
        let total = codec::chunk_count(source.size(), config.chunk_size)?;
        let (progress_tx, progress_rx) = watch::channel(SendProgress::new(total, source.size()));

        Ok(Self {
            source,
            config,
            clipboard,
            clock,
            total,
            progress_tx,
            progress_rx,
        })
    }

    /// Read `path` and prepare a send.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the options are invalid.
    pub async fn open(
        path: impl AsRef<std::path::Path>,
        config: SendConfig,
        clipboard: C,
        clock: K,
    ) -> Result<Self> {
        let source = SourceFile::read(path).await?;
        Self::new(source, config, clipboard, clock)
    }

    /// Get a progress receiver.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<SendProgress> {
        self.progress_rx.clone()
    }

    /// Number of frames this send publishes.
    #[must_use]
    pub const fn total_chunks(&self) -> u32 {
        self.total
    }

    /// The file being sent.
    #[must_use]
    pub const fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Publish every frame, holding each on the clipboard for one interval.
    ///
    /// Returns the clipboard so a caller can keep it alive (on X11 the
    /// selection disappears with its owner).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClipboardAccess`] once a clipboard write fails after
    /// its retries.
    pub async fn run(mut self) -> Result<C> {
        let data = std::mem::take(&mut self.source.data);
        let file_size = data.len() as u64;
        let chunks = codec::split(&data, self.config.chunk_size)?;
        let started = self.clock.now();

        tracing::info!(
            "Sending {} ({}) as {} frame(s) every {:?}",
            self.source.name,
            format_size(file_size),
            self.total,
            self.config.interval
        );
        self.progress_tx.send_modify(|p| p.state = SendState::Sending);

        if self.config.wait_first {
            tracing::debug!("Waiting one interval before the first frame");
            self.clock.sleep(self.config.interval).await;
        }

        for (i, chunk) in chunks.iter().copied().enumerate() {
            let index = u32::try_from(i + 1).unwrap_or(u32::MAX);

            if self.config.align {
                let delay =
                    delay_to_boundary(self.clock.unix_time(), self.config.interval, Duration::ZERO);
                self.clock.sleep(delay).await;
            }

            let text = codec::encode_frame(chunk, index, self.total, &self.source.name, file_size);
            self.publish(&text, index, chunk, file_size).await?;
            self.record(index, chunk, text.len(), started);

            if self.config.align && index < self.total {
                continue;
            }
            self.clock.sleep(self.config.interval).await;
        }

        self.progress_tx.send_modify(|p| {
            p.state = SendState::Done;
            p.eta = Some(Duration::ZERO);
        });
        tracing::info!("Sent {} frame(s) of {}", self.total, self.source.name);

        Ok(self.clipboard)
    }

    async fn publish(&mut self, text: &str, index: u32, chunk: &[u8], file_size: u64) -> Result<()> {
        let retry = self.config.retry;
        retry.write(&mut self.clipboard, &self.clock, text).await?;

        if !self.config.verify_writes {
            return Ok(());
        }

        for attempt in 1..=retry.attempts {
            let current = retry.read(&mut self.clipboard, &self.clock).await?;
            // Compared decoded: clipboards may rewrite line endings or trim.
            let kept = current
                .as_deref()
                .and_then(|raw| codec::validate(raw).ok())
                .is_some_and(|frame| {
                    frame.sequence_index == index
                        && frame.total_chunks == self.total
                        && frame.file_size == file_size
                        && frame.filename == self.source.name
                        && frame.data == chunk
                });
            if kept {
                return Ok(());
            }
            tracing::warn!(
                "Frame {} was not on the clipboard after writing (check {}/{}), rewriting",
                index,
                attempt,
                retry.attempts
            );
            self.clock.sleep(retry.backoff(attempt)).await;
            retry.write(&mut self.clipboard, &self.clock, text).await?;
        }

        Err(Error::ClipboardAccess(format!(
            "frame {index} did not stay on the clipboard after {} writes",
            retry.attempts + 1
        )))
    }

    fn record(&self, sent: u32, chunk: &[u8], frame_len: usize, started: Instant) {
        let elapsed = self.clock.now().saturating_duration_since(started);
        let total = self.total;
        let bytes = chunk.len() as u64;
        let crc = codec::checksum(chunk);

        self.progress_tx.send_modify(|p| {
            p.current = sent;
            p.bytes_sent += bytes;
            p.frame_len = frame_len;
            p.last_crc = crc;

            let secs = elapsed.as_secs_f64();
            if secs > 0.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    p.speed_bps = (p.bytes_sent as f64 / secs) as u64;
                }
            }
            // Remaining frames each take one interval regardless of size.
            let remaining = total.saturating_sub(sent);
            p.eta = Some(self.config.interval * remaining);
        });

        tracing::debug!(
            "Published frame {}/{} ({} bytes, crc32={:08X})",
            sent,
            total,
            bytes,
            crc
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::clock::ManualClock;
    use crate::codec::validate;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn source(data: &[u8]) -> SourceFile {
        SourceFile {
            path: PathBuf::from("digits.txt"),
            name: "digits.txt".to_string(),
            data: data.to_vec(),
        }
    }

    fn config(chunk_size: usize) -> SendConfig {
        SendConfig {
            chunk_size,
            interval: Duration::from_secs(10),
            ..SendConfig::default()
        }
    }

    /// Clipboard that records every write.
    #[derive(Clone, Default)]
    struct Recorder {
        writes: Arc<Mutex<Vec<String>>>,
    }

    impl ClipboardAccess for Recorder {
        fn read(&mut self) -> Result<Option<String>> {
            Ok(self.writes.lock().unwrap().last().cloned())
        }

        fn write(&mut self, text: &str) -> Result<()> {
            self.writes.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publishes_every_frame_in_order() {
        let recorder = Recorder::default();
        let clock = Arc::new(ManualClock::default());
        let sender = Sender::new(source(b"0123456789"), config(4), recorder.clone(), clock.clone())
            .unwrap();
        assert_eq!(sender.total_chunks(), 3);

        let progress = sender.progress();
        sender.run().await.unwrap();

        let writes = recorder.writes.lock().unwrap().clone();
        let payloads: Vec<Vec<u8>> = writes.iter().map(|w| validate(w).unwrap().data).collect();
        assert_eq!(payloads, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);

        // One interval after every frame, including the last.
        assert_eq!(clock.slept(), Duration::from_secs(30));

        let p = progress.borrow().clone();
        assert_eq!(p.state, SendState::Done);
        assert_eq!(p.current, 3);
        assert_eq!(p.bytes_sent, 10);
        assert!((p.percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_file_is_one_frame() {
        let recorder = Recorder::default();
        let clock = ManualClock::default();
        let sender = Sender::new(source(b""), config(4), recorder.clone(), clock).unwrap();
        sender.run().await.unwrap();

        let writes = recorder.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        let frame = validate(&writes[0]).unwrap();
        assert_eq!(frame.total_chunks, 1);
        assert_eq!(frame.file_size, 0);
        assert!(frame.data.is_empty());
    }

    #[tokio::test]
    async fn test_wait_first_adds_one_interval() {
        let clock = Arc::new(ManualClock::default());
        let mut cfg = config(4);
        cfg.wait_first = true;
        let sender =
            Sender::new(source(b"0123456789"), cfg, Recorder::default(), clock.clone()).unwrap();
        sender.run().await.unwrap();

        assert_eq!(clock.slept(), Duration::from_secs(40));
    }

    #[tokio::test]
    async fn test_align_publishes_on_boundaries() {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_003)));
        let mut cfg = config(4);
        cfg.align = true;
        let sender =
            Sender::new(source(b"0123456789"), cfg, Recorder::default(), clock.clone()).unwrap();
        sender.run().await.unwrap();

        // Frames at 1010, 1020, 1030, then held until 1040.
        assert_eq!(clock.unix_time(), Duration::from_secs(1_040));
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_retried() {
        let clipboard = MemoryClipboard::new();
        clipboard.fail_next(2, "busy");
        let sender = Sender::new(
            source(b"0123"),
            config(4),
            clipboard.clone(),
            ManualClock::default(),
        )
        .unwrap();
        sender.run().await.unwrap();

        assert_eq!(validate(&clipboard.get().unwrap()).unwrap().data, b"0123");
    }

    #[tokio::test]
    async fn test_persistent_write_failure_is_fatal() {
        let clipboard = MemoryClipboard::new();
        clipboard.fail_next(100, "no display");
        let sender = Sender::new(
            source(b"0123"),
            config(4),
            clipboard,
            ManualClock::default(),
        )
        .unwrap();

        assert!(matches!(
            sender.run().await,
            Err(Error::ClipboardAccess(_))
        ));
    }

    /// Clipboard that silently drops the first `drops` writes.
    struct Lossy {
        inner: MemoryClipboard,
        drops: usize,
    }

    impl ClipboardAccess for Lossy {
        fn read(&mut self) -> Result<Option<String>> {
            self.inner.read()
        }

        fn write(&mut self, text: &str) -> Result<()> {
            if self.drops > 0 {
                self.drops -= 1;
                return Ok(());
            }
            self.inner.write(text)
        }
    }

    #[tokio::test]
    async fn test_verify_rewrites_lost_frame() {
        let inner = MemoryClipboard::new();
        let clipboard = Lossy {
            inner: inner.clone(),
            drops: 1,
        };
        let mut cfg = config(4);
        cfg.verify_writes = true;
        let sender = Sender::new(source(b"0123"), cfg, clipboard, ManualClock::default()).unwrap();
        sender.run().await.unwrap();

        assert_eq!(validate(&inner.get().unwrap()).unwrap().data, b"0123");
        assert_eq!(inner.write_count(), 1);
    }

    /// Clipboard that stores text with Windows line endings.
    #[derive(Clone, Default)]
    struct Crlf {
        inner: MemoryClipboard,
    }

    impl ClipboardAccess for Crlf {
        fn read(&mut self) -> Result<Option<String>> {
            self.inner.read()
        }

        fn write(&mut self, text: &str) -> Result<()> {
            self.inner.write(&text.replace('\n', "\r\n"))
        }
    }

    #[tokio::test]
    async fn test_verify_accepts_rewritten_line_endings() {
        let clipboard = Crlf::default();
        let mut cfg = config(4);
        cfg.verify_writes = true;
        let sender =
            Sender::new(source(b"0123456789"), cfg, clipboard.clone(), ManualClock::default())
                .unwrap();
        sender.run().await.unwrap();

        // No rewrites: one write per frame.
        assert_eq!(clipboard.inner.write_count(), 3);
        assert!(clipboard.inner.get().unwrap().contains("\r\n"));
    }

    #[tokio::test]
    async fn test_verify_accepts_empty_file_frame() {
        let clipboard = MemoryClipboard::new();
        let mut cfg = config(4);
        cfg.verify_writes = true;
        let sender =
            Sender::new(source(b""), cfg, clipboard.clone(), ManualClock::default()).unwrap();
        sender.run().await.unwrap();

        assert_eq!(clipboard.write_count(), 1);
    }

    #[tokio::test]
    async fn test_verify_rewrites_a_frame_from_another_sender() {
        let inner = MemoryClipboard::new();
        // Drops the first write, leaving a valid frame of another file behind.
        inner.set(codec::encode_frame(b"0123", 1, 1, "other.txt", 4));
        let clipboard = Lossy {
            inner: inner.clone(),
            drops: 1,
        };
        let mut cfg = config(4);
        cfg.verify_writes = true;
        let sender = Sender::new(source(b"0123"), cfg, clipboard, ManualClock::default()).unwrap();
        sender.run().await.unwrap();

        assert_eq!(validate(&inner.get().unwrap()).unwrap().filename, "digits.txt");
    }

    #[test]
    fn test_config_validation() {
        assert!(config(0).validate().is_err());
        let mut cfg = config(4);
        cfg.interval = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }
}
