//! Chunk-size literals such as `4m`, `512k` or `65536`.

use crate::error::{Error, Result};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Parse a chunk-size literal.
///
/// Suffixes are binary multiples and case-insensitive: `k`/`kb`, `m`/`mb`,
/// `g`/`gb`. A suffixed value may be fractional (`1.5m`). A bare integer is a
/// raw byte count.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] for empty, zero, negative,
/// unparseable, or unknown-suffix literals.
pub fn parse_chunk_size(literal: &str) -> Result<usize> {
    let invalid = |reason: &str| Error::invalid_config("chunk", format!("'{literal}': {reason}"));

    let s = literal.trim().to_ascii_lowercase();
    if s.is_empty() {
        return Err(invalid("empty size"));
    }

    let split_at = s
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split_at);
    let number = number.trim();

    let multiplier = match unit {
        "" => {
            let bytes: u64 = number
                .parse()
                .map_err(|_| invalid("not a whole number of bytes"))?;
            if bytes == 0 {
                return Err(invalid("must be greater than 0"));
            }
            return usize::try_from(bytes).map_err(|_| invalid("too large"));
        }
        "k" | "kb" => KIB,
        "m" | "mb" => MIB,
        "g" | "gb" => GIB,
        other => return Err(invalid(&format!("unknown suffix '{other}'"))),
    };

    let value: f64 = number.parse().map_err(|_| invalid("not a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid("must be greater than 0"));
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let bytes = (value * multiplier as f64) as u64;
    if bytes == 0 {
        return Err(invalid("must be at least one byte"));
    }
    usize::try_from(bytes).map_err(|_| invalid("too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_multiples() {
        assert_eq!(parse_chunk_size("1m").unwrap(), 1_048_576);
        assert_eq!(parse_chunk_size("512k").unwrap(), 524_288);
        assert_eq!(parse_chunk_size("4m").unwrap(), 4_194_304);
        assert_eq!(parse_chunk_size("1g").unwrap(), 1_073_741_824);
    }

    #[test]
    fn test_long_and_uppercase_suffixes() {
        assert_eq!(parse_chunk_size("2MB").unwrap(), 2 * 1_048_576);
        assert_eq!(parse_chunk_size("64Kb").unwrap(), 65_536);
        assert_eq!(parse_chunk_size(" 8k ").unwrap(), 8192);
    }

    #[test]
    fn test_bare_integer_is_bytes() {
        assert_eq!(parse_chunk_size("4").unwrap(), 4);
        assert_eq!(parse_chunk_size("65536").unwrap(), 65_536);
    }

    #[test]
    fn test_fractional_with_suffix() {
        assert_eq!(parse_chunk_size("1.5m").unwrap(), 1_572_864);
        assert_eq!(parse_chunk_size("0.5k").unwrap(), 512);
    }

    #[test]
    fn test_invalid_literals() {
        for bad in ["", "0", "0m", "-1m", "4x", "4mib", "abc", "1.5", "m", "nanm"] {
            assert!(
                matches!(
                    parse_chunk_size(bad),
                    Err(Error::InvalidConfiguration { .. })
                ),
                "'{bad}' should be rejected"
            );
        }
    }
}
