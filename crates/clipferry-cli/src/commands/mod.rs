//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

pub mod config;
pub mod diagnose;
pub mod receive;
pub mod send;

/// Load configuration with graceful fallback to defaults.
///
/// A config file that cannot be read or parsed is reported and then ignored,
/// so a broken file never blocks a transfer.
pub fn load_config() -> clipferry_core::config::Config {
    clipferry_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        clipferry_core::config::Config::default()
    })
}

/// Parse an interval flag, falling back to the configured value.
pub fn interval_or(
    flag: Option<&str>,
    key: &str,
    fallback: Duration,
) -> clipferry_core::Result<Duration> {
    flag.map_or(Ok(fallback), |text| {
        crate::ui::parse_duration(text).ok_or_else(|| {
            clipferry_core::Error::invalid_config(
                key,
                format!("'{text}' is not a duration (try 10, 2.5, 500ms or 1m)"),
            )
        })
    })
}

/// Clipferry - file transfer over a shared text clipboard
#[derive(Parser)]
#[command(name = "clipferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Publish a file to the clipboard one chunk at a time
    Send(SendArgs),

    /// Rebuild a file from chunks seen on the clipboard
    Receive(ReceiveArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Check clipboard access
    Diagnose,
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// File to send
    pub file: PathBuf,

    /// Bytes of the file per frame (e.g. 65536, 512k, 4m)
    #[arg(short, long)]
    pub chunk: Option<String>,

    /// Seconds between two frames (e.g. 10, 2.5, 500ms)
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Wait one interval before the first frame
    #[arg(long)]
    pub wait_first: bool,

    /// Publish on wall-clock multiples of the interval
    #[arg(long)]
    pub align: bool,

    /// Read every frame back and rewrite it if it was replaced
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for the receive command
#[derive(Parser)]
pub struct ReceiveArgs {
    /// Output file (defaults to the name advertised by the sender)
    pub output: Option<PathBuf>,

    /// Seconds between two clipboard reads (e.g. 2, 0.5, 500ms)
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Give up after this long without a new chunk (0 waits forever)
    #[arg(short, long)]
    pub timeout: Option<String>,

    /// Resume into an existing partial output
    #[arg(short, long)]
    pub append: bool,

    /// Expected number of chunks; frames with another total are skipped
    #[arg(long, value_name = "N")]
    pub expect_total: Option<u32>,

    /// Directory for the advertised filename
    #[arg(long, value_name = "DIR", conflicts_with = "output")]
    pub out_dir: Option<PathBuf>,

    /// Poll half way between wall-clock multiples of the interval
    #[arg(long)]
    pub align: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "clipferry",
            "send",
            "report.pdf",
            "--chunk",
            "512k",
            "--interval",
            "5",
            "--verify",
        ])
        .expect("send should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.file, PathBuf::from("report.pdf"));
        assert_eq!(args.chunk.as_deref(), Some("512k"));
        assert_eq!(args.interval.as_deref(), Some("5"));
        assert!(args.verify);
        assert!(!args.wait_first);
    }

    #[test]
    fn test_parse_receive() {
        let cli = Cli::try_parse_from([
            "clipferry",
            "-v",
            "receive",
            "out.bin",
            "--append",
            "--expect-total",
            "12",
            "--timeout",
            "5m",
        ])
        .expect("receive should parse");

        assert!(cli.verbose);
        let Command::Receive(args) = cli.command else {
            panic!("expected receive");
        };
        assert_eq!(args.output, Some(PathBuf::from("out.bin")));
        assert!(args.append);
        assert_eq!(args.expect_total, Some(12));
        assert_eq!(args.timeout.as_deref(), Some("5m"));
    }

    #[test]
    fn test_output_conflicts_with_out_dir() {
        let err = Cli::try_parse_from(["clipferry", "receive", "a.bin", "--out-dir", "downloads"])
            .err()
            .expect("conflicting flags should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let err = Cli::try_parse_from(["clipferry", "-q", "-v", "diagnose"])
            .err()
            .expect("conflicting flags should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_interval_or() {
        let fallback = Duration::from_secs(10);
        assert_eq!(interval_or(None, "interval", fallback).unwrap(), fallback);
        assert_eq!(
            interval_or(Some("2.5"), "interval", fallback).unwrap(),
            Duration::from_millis(2500)
        );
        assert!(interval_or(Some("soon"), "interval", fallback).is_err());
    }
}
