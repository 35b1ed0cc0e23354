//! Clipferry CLI - file transfer over a shared text clipboard
//!
//! Clipferry moves a file between two machines whose only shared channel is
//! a text clipboard, such as a remote desktop session with file transfer
//! disabled.
//!
//! ## Quick Start
//!
//! ```bash
//! # On the machine that has the file
//! clipferry send ./report.pdf
//!
//! # On the other side of the clipboard
//! clipferry receive
//!
//! # Resume after an interruption
//! clipferry receive report.pdf --append
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]
#![allow(clippy::struct_excessive_bools)]

use std::process::ExitCode;

use clap::Parser;

mod commands;
mod exit;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Send(args) => commands::send::run(args, cli.quiet).await,
        Command::Receive(args) => commands::receive::run(args, cli.quiet).await,
        Command::Config(args) => commands::config::run(args).await,
        Command::Diagnose => commands::diagnose::run().await,
    };

    match result {
        Ok(()) => ExitCode::from(exit::SUCCESS),
        Err(err) => {
            exit::report(&err);
            ExitCode::from(exit::code_for(&err))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "warn,clipferry=debug,clipferry_core=debug"
    } else if quiet {
        "warn"
    } else {
        "warn,clipferry=info,clipferry_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Progress lines own stdout.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
