//! Diagnose command implementation.

use anyhow::Result;

use clipferry_core::clipboard::{create_clipboard, diagnose_clipboard};

/// Run the diagnose command.
pub async fn run() -> Result<()> {
    println!();
    println!("  Clipboard diagnostics");
    println!();
    for line in diagnose_clipboard().lines() {
        println!("  {line}");
    }
    println!();

    create_clipboard()?;
    println!("  Clipboard is readable (writes were not tested).");
    println!();

    Ok(())
}
