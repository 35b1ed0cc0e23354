//! UI utilities for the Clipferry CLI.

use std::time::Duration;

use clipferry_core::file::format_size;
use clipferry_core::receive::ReceiveProgress;
use clipferry_core::send::SendProgress;

/// Parse a duration given on the command line.
///
/// A bare number is seconds. `ms`, `s`, `m` and `h` suffixes are accepted.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        let num: u64 = num_str.trim().parse().ok()?;
        Some(Duration::from_millis(num))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.trim().parse().ok()?;
        Some(Duration::from_secs(num.checked_mul(60)?))
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.trim().parse().ok()?;
        Some(Duration::from_secs(num.checked_mul(3600)?))
    } else {
        let num_str = s.strip_suffix('s').unwrap_or(s);
        let secs: f64 = num_str.trim().parse().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }
}

/// Format a duration as "M:SS".
pub fn format_remaining(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{}:{:02}", mins, secs)
}

/// One line per published frame.
pub fn send_line(progress: &SendProgress) -> String {
    let eta = progress
        .eta
        .map_or_else(|| "--".to_string(), format_remaining);

    format!(
        "  [{}/{}] frame {} | {}/{} ({:.1}%) | {}/s | ETA {} | crc32 {:08X}",
        progress.current,
        progress.total,
        format_size(progress.frame_len as u64),
        format_size(progress.bytes_sent),
        format_size(progress.total_bytes),
        progress.percentage(),
        format_size(progress.speed_bps),
        eta,
        progress.last_crc,
    )
}

/// One line per chunk written.
pub fn receive_line(progress: &ReceiveProgress) -> String {
    let total = progress
        .total
        .map_or_else(|| "?".to_string(), |t| t.to_string());
    let written = progress.file_size.map_or_else(
        || format_size(progress.bytes_written),
        |size| format!("{}/{}", format_size(progress.bytes_written), format_size(size)),
    );
    let index = progress
        .last_index
        .map_or_else(|| "-".to_string(), |i| i.to_string());
    let crc = progress
        .last_crc
        .map_or_else(|| "--------".to_string(), |c| format!("{c:08X}"));

    format!(
        "  [{}/{}] chunk {} | {} | {}/s | crc32 {}",
        progress.received,
        total,
        index,
        written,
        format_size(progress.speed_bps),
        crc,
    )
}
