//! Send command implementation.

use anyhow::{Context, Result};
use tokio::sync::watch;

use clipferry_core::clipboard::create_clipboard;
use clipferry_core::clock::TokioClock;
use clipferry_core::codec::parse_chunk_size;
use clipferry_core::file::format_size;
use clipferry_core::send::{SendConfig, SendProgress, SendState, Sender};

use super::SendArgs;
use crate::exit::Interrupted;
use crate::ui;

/// Run the send command.
pub async fn run(args: SendArgs, quiet: bool) -> Result<()> {
    let global_config = super::load_config();
    global_config.validate()?;

    let chunk_size = match args.chunk.as_deref() {
        Some(literal) => parse_chunk_size(literal)?,
        None => global_config.chunk_size()?,
    };
    let interval = super::interval_or(
        args.interval.as_deref(),
        "interval",
        global_config.send.interval,
    )?;

    if interval < clipferry_core::DEFAULT_POLL_INTERVAL {
        tracing::warn!(
            "A send interval of {:?} is shorter than the default receive poll interval ({:?}); \
             a receiver with default settings will miss frames",
            interval,
            clipferry_core::DEFAULT_POLL_INTERVAL
        );
    }

    let config = SendConfig {
        chunk_size,
        interval,
        wait_first: args.wait_first || global_config.send.wait_first,
        align: args.align || global_config.send.align,
        verify_writes: args.verify || global_config.send.verify_writes,
        retry: global_config.clipboard.retry_policy(),
    };

    let clipboard = create_clipboard().context("Failed to open the clipboard")?;
    let sender = Sender::open(&args.file, config, clipboard, TokioClock).await?;

    if !quiet {
        let source = sender.source();
        println!();
        println!("  Clipferry v{}", clipferry_core::VERSION);
        println!();
        println!(
            "  Sending {} ({}) as {} frame(s) of up to {}, one every {:?}",
            source.name,
            format_size(source.size()),
            sender.total_chunks(),
            format_size(chunk_size as u64),
            interval
        );
        println!("  Start the receiver now. Press Ctrl+C to stop.");
        println!();
    }

    let progress = sender.progress();
    let display = (!quiet).then(|| tokio::spawn(display_progress(progress)));

    // The clipboard stays alive until the process exits so the last frame is
    // not dropped with its owner on X11.
    let _clipboard = tokio::select! {
        result = sender.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping");
            return Err(Interrupted.into());
        }
    };

    if let Some(display) = display {
        let _ = display.await;
    }

    if !quiet {
        println!();
        println!("  All frames published.");
        println!();
    }

    Ok(())
}

async fn display_progress(mut rx: watch::Receiver<SendProgress>) {
    let mut last_printed = 0;

    loop {
        if rx.changed().await.is_err() {
            break;
        }

        let progress = rx.borrow().clone();

        if progress.current != last_printed {
            last_printed = progress.current;
            println!("{}", ui::send_line(&progress));
        }

        if progress.state == SendState::Done {
            break;
        }
    }
}
