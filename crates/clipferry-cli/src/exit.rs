//! Process exit codes.

use std::fmt;

use clipferry_core::Error;

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;
/// Bad flags or configuration. clap exits with the same code.
pub const USAGE: u8 = 2;
pub const MISMATCH: u8 = 3;
pub const TIMEOUT: u8 = 4;
pub const CLIPBOARD: u8 = 5;
pub const INTERRUPTED: u8 = 130;

/// Returned by a command that stopped on Ctrl+C.
#[derive(Debug)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Exit code for a failed command.
pub fn code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<Interrupted>().is_some() {
        return INTERRUPTED;
    }

    match err.downcast_ref::<Error>() {
        Some(Error::InvalidConfiguration { .. } | Error::ConfigError(_)) => USAGE,
        Some(Error::SessionMismatch { .. }) => MISMATCH,
        Some(Error::Timeout(_)) => TIMEOUT,
        Some(Error::ClipboardAccess(_)) => CLIPBOARD,
        _ => FAILURE,
    }
}

/// Print a failed command's error to stderr.
pub fn report(err: &anyhow::Error) {
    if err.downcast_ref::<Interrupted>().is_some() {
        eprintln!();
        eprintln!("  Interrupted.");
        return;
    }

    let core = err.downcast_ref::<Error>();
    match core.and_then(Error::code) {
        Some(code) => eprintln!("error[{code}]: {err:#}"),
        None => eprintln!("error: {err:#}"),
    }

    if let Some(suggestion) = core.and_then(Error::suggestion) {
        eprintln!();
        for line in suggestion.lines() {
            eprintln!("  {line}");
        }
    }
}
