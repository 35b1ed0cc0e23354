//! End-to-end transfers through an in-memory clipboard.
//!
//! The sender and the receiver run concurrently on a paused tokio clock, so
//! the intervals are honoured without any real waiting.

mod common;

use std::time::Duration;

use clipferry_core::clipboard::{ClipboardAccess, MemoryClipboard};
use clipferry_core::clock::TokioClock;
use clipferry_core::receive::{ReceiveConfig, ReceiveState, Receiver};
use clipferry_core::send::{SendConfig, SendState, Sender};
use clipferry_core::Error;

use common::{assert_files_equal, create_temp_dir, create_test_file, fast_retry, random_bytes};

fn send_config(chunk_size: usize) -> SendConfig {
    SendConfig {
        chunk_size,
        interval: Duration::from_secs(10),
        retry: fast_retry(),
        ..SendConfig::default()
    }
}

fn receive_config(out_dir: &std::path::Path) -> ReceiveConfig {
    ReceiveConfig {
        out_dir: out_dir.to_path_buf(),
        interval: Duration::from_secs(2),
        timeout: Duration::from_secs(60),
        retry: fast_retry(),
        ..ReceiveConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_reference_file_end_to_end() {
    let src = create_temp_dir();
    let dst = create_temp_dir();
    let input = create_test_file(src.path(), "digits.txt", b"0123456789");
    let clipboard = MemoryClipboard::new();

    let sender = Sender::open(&input, send_config(4), clipboard.clone(), TokioClock)
        .await
        .unwrap();
    assert_eq!(sender.total_chunks(), 3);
    let receiver = Receiver::new(receive_config(dst.path()), clipboard.clone(), TokioClock).unwrap();

    let (sent, received) = tokio::join!(sender.run(), receiver.run());
    sent.unwrap();
    let outcome = received.unwrap();

    assert_eq!(outcome.path, dst.path().join("digits.txt"));
    assert_eq!(outcome.chunks, 3);
    assert_eq!(outcome.resumed, 0);
    assert_files_equal(&input, &outcome.path);
    assert_eq!(clipboard.write_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_random_binary_file_end_to_end() {
    let src = create_temp_dir();
    let dst = create_temp_dir();
    let input = create_test_file(src.path(), "blob.bin", &random_bytes(100 * 1024 + 17));
    let clipboard = MemoryClipboard::new();

    let sender = Sender::open(&input, send_config(4096), clipboard.clone(), TokioClock)
        .await
        .unwrap();
    let send_progress = sender.progress();
    let receiver = Receiver::new(receive_config(dst.path()), clipboard, TokioClock).unwrap();
    let receive_progress = receiver.progress();

    let (sent, received) = tokio::join!(sender.run(), receiver.run());
    sent.unwrap();
    let outcome = received.unwrap();

    assert_files_equal(&input, &outcome.path);
    assert_eq!(outcome.chunks, 26);
    assert_eq!(send_progress.borrow().state, SendState::Done);
    assert_eq!(send_progress.borrow().current, 26);
    assert_eq!(receive_progress.borrow().state, ReceiveState::Complete);
    assert_eq!(receive_progress.borrow().received, 26);
}

#[tokio::test(start_paused = true)]
async fn test_empty_file_end_to_end() {
    let src = create_temp_dir();
    let dst = create_temp_dir();
    let input = create_test_file(src.path(), "empty.txt", b"");
    let clipboard = MemoryClipboard::new();

    let sender = Sender::open(&input, send_config(4), clipboard.clone(), TokioClock)
        .await
        .unwrap();
    let receiver = Receiver::new(receive_config(dst.path()), clipboard, TokioClock).unwrap();

    let (sent, received) = tokio::join!(sender.run(), receiver.run());
    sent.unwrap();
    let outcome = received.unwrap();

    assert_eq!(outcome.file_size, 0);
    assert_eq!(std::fs::read(&outcome.path).unwrap(), b"");
}

#[tokio::test(start_paused = true)]
async fn test_third_party_copies_between_frames() {
    let src = create_temp_dir();
    let dst = create_temp_dir();
    let data = random_bytes(4 * 1024);
    let input = create_test_file(src.path(), "notes.bin", &data);
    let clipboard = MemoryClipboard::new();

    let sender = Sender::open(&input, send_config(1024), clipboard.clone(), TokioClock)
        .await
        .unwrap();
    let receiver =
        Receiver::new(receive_config(dst.path()), clipboard.clone(), TokioClock).unwrap();

    // Someone copies unrelated text half way through each frame's interval.
    let meddler = {
        let clipboard = clipboard.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            for i in 0..3 {
                clipboard.set(format!("unrelated text {i}"));
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    };

    let (sent, received, ()) = tokio::join!(sender.run(), receiver.run(), meddler);
    sent.unwrap();
    let outcome = received.unwrap();

    assert_files_equal(&input, &outcome.path);
}

#[tokio::test(start_paused = true)]
async fn test_receiver_times_out_when_sender_stops() {
    let src = create_temp_dir();
    let dst = create_temp_dir();
    let data = random_bytes(3000);
    let input = create_test_file(src.path(), "cut.bin", &data);
    let clipboard = MemoryClipboard::new();

    let sender = Sender::open(&input, send_config(1000), clipboard.clone(), TokioClock)
        .await
        .unwrap();
    let mut config = receive_config(dst.path());
    config.timeout = Duration::from_secs(30);
    let receiver = Receiver::new(config, clipboard, TokioClock).unwrap();
    let progress = receiver.progress();

    // The sender is interrupted after its first frame.
    let interrupted = async {
        tokio::time::timeout(Duration::from_secs(5), sender.run())
            .await
            .is_err()
    };

    let (was_cut, received) = tokio::join!(interrupted, receiver.run());
    assert!(was_cut);
    assert!(matches!(received, Err(Error::Timeout(30))));
    assert_eq!(progress.borrow().state, ReceiveState::TimedOut);
    assert_eq!(progress.borrow().received, 1);

    // Partial output and journal stay behind for --append.
    let output = dst.path().join("cut.bin");
    assert!(output.exists());
    assert!(clipferry_core::receive::journal_path(&output).exists());
}

/// Clipboard whose contents vanish right after every write, as if another
/// program grabbed it immediately.
struct Stolen {
    inner: MemoryClipboard,
}

impl ClipboardAccess for Stolen {
    fn read(&mut self) -> clipferry_core::Result<Option<String>> {
        self.inner.read()
    }

    fn write(&mut self, text: &str) -> clipferry_core::Result<()> {
        self.inner.write(text)?;
        self.inner.set("stolen");
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_verify_gives_up_on_a_clipboard_that_never_keeps_frames() {
    let src = create_temp_dir();
    let input = create_test_file(src.path(), "x.bin", b"abc");

    let mut config = send_config(4);
    config.verify_writes = true;
    let sender = Sender::open(
        &input,
        config,
        Stolen {
            inner: MemoryClipboard::new(),
        },
        TokioClock,
    )
    .await
    .unwrap();

    assert!(matches!(
        sender.run().await,
        Err(Error::ClipboardAccess(_))
    ));
}
