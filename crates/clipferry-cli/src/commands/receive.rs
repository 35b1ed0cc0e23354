//! Receive command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::watch;

use clipferry_core::clipboard::create_clipboard;
use clipferry_core::clock::TokioClock;
use clipferry_core::file::format_size;
use clipferry_core::receive::{ReceiveConfig, ReceiveProgress, ReceiveState, Receiver};

use super::ReceiveArgs;
use crate::exit::Interrupted;
use crate::ui;

/// Run the receive command.
pub async fn run(args: ReceiveArgs, quiet: bool) -> Result<()> {
    let global_config = super::load_config();
    global_config.validate()?;

    let interval = super::interval_or(
        args.interval.as_deref(),
        "interval",
        global_config.receive.interval,
    )?;
    let timeout = super::interval_or(
        args.timeout.as_deref(),
        "timeout",
        global_config.receive.timeout,
    )?;
    let out_dir = args
        .out_dir
        .or(global_config.receive.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = ReceiveConfig {
        output: args.output,
        out_dir,
        interval,
        timeout,
        append: args.append,
        expected_total: args.expect_total,
        align: args.align,
        retry: global_config.clipboard.retry_policy(),
    };

    let clipboard = create_clipboard().context("Failed to open the clipboard")?;
    let receiver = Receiver::new(config, clipboard, TokioClock)?;

    if !quiet {
        println!();
        println!("  Clipferry v{}", clipferry_core::VERSION);
        println!();
        println!("  Watching the clipboard every {:?}", interval);
        if !timeout.is_zero() {
            println!("  Giving up after {:?} without a new chunk", timeout);
        }
        println!("  Start the sender now. Press Ctrl+C to stop.");
        println!();
    }

    let progress = receiver.progress();
    let display = (!quiet).then(|| tokio::spawn(display_progress(progress)));

    let outcome = tokio::select! {
        result = receiver.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping");
            if !quiet {
                println!();
                println!("  Partial output kept. Run again with --append to resume.");
            }
            return Err(Interrupted.into());
        }
    };

    if let Some(display) = display {
        let _ = display.await;
    }

    if !quiet {
        println!();
        println!("  Transfer complete!");
        println!();
        println!("  Saved to: {}", outcome.path.display());
        println!(
            "  {} in {} chunk(s), {:.1}s",
            format_size(outcome.file_size),
            outcome.chunks,
            outcome.elapsed.as_secs_f64()
        );
        if outcome.resumed > 0 {
            println!("  {} chunk(s) were already on disk", outcome.resumed);
        }
        println!();
    }

    Ok(())
}

async fn display_progress(mut rx: watch::Receiver<ReceiveProgress>) {
    let mut last_state = ReceiveState::WaitingFirstFrame;
    let mut last_received = 0;

    loop {
        if rx.changed().await.is_err() {
            break;
        }

        let progress = rx.borrow().clone();

        if progress.state != last_state {
            last_state = progress.state;

            if progress.state == ReceiveState::Receiving {
                if let (Some(name), Some(output)) = (&progress.filename, &progress.output) {
                    println!("  Receiving {} into {}", name, output.display());
                }
            }
        }

        if progress.received != last_received {
            last_received = progress.received;
            println!("{}", ui::receive_line(&progress));
        }

        if progress.state.is_terminal() {
            break;
        }
    }
}
