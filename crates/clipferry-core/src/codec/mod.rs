//! Clipboard frame codec.
//!
//! Every clipboard write made by the sender is one self-describing text frame:
//!
//! ```text
//! CLIPFERRY/1|seq=2|total=3|len=8|crc=6B1E9C5A|fsize=10|name=notes.txt
//! NDU2Nw==
//! ```
//!
//! The first line is the header: the protocol marker followed by `|`
//! separated `key=value` fields. Everything after the first newline is the
//! standard (padded) base64 encoding of one chunk of the file. `crc` is the
//! CRC-32 of the *decoded* chunk bytes, `len` is the length of the base64
//! payload in characters.
//!
//! Encoding is deterministic: the same chunk always produces the same text.

mod size;
mod validate;

pub use size::parse_chunk_size;
pub use validate::{decode_frame, validate, Rejection};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Marker that opens every frame header.
pub const FRAME_MARKER: &str = "CLIPFERRY/1";

/// Prefix shared by every protocol version's marker.
pub(crate) const MARKER_FAMILY: &str = "CLIPFERRY/";

/// A decoded, checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 1-based position of this chunk in the file
    pub sequence_index: u32,
    /// Number of chunks in the session
    pub total_chunks: u32,
    /// CRC-32 of `data`
    pub checksum: u32,
    /// Name of the file on the sending side
    pub filename: String,
    /// Size of the whole file in bytes
    pub file_size: u64,
    /// Decoded chunk bytes
    pub data: Vec<u8>,
}

impl Frame {
    /// Build a frame for a chunk, computing its checksum.
    #[must_use]
    pub fn new(
        data: Vec<u8>,
        sequence_index: u32,
        total_chunks: u32,
        filename: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            sequence_index,
            total_chunks,
            checksum: checksum(&data),
            filename: filename.into(),
            file_size,
            data,
        }
    }

    /// Whether this frame carries the final chunk of the file.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.sequence_index == self.total_chunks
    }

    /// Chunk length implied by this frame's own geometry.
    ///
    /// A file of `file_size` bytes split into `total_chunks` chunks has equal
    /// chunks followed by a non-empty last chunk no longer than the others. A
    /// non-last frame's length is the chunk length; the last frame implies it
    /// from the bytes before it. For a single-chunk file it is the file size.
    ///
    /// Returns `None` when no such split can contain this frame.
    #[must_use]
    pub fn implied_chunk_len(&self) -> Option<u64> {
        let len = self.data.len() as u64;
        let total = u64::from(self.total_chunks);

        if total <= 1 {
            return (len == self.file_size).then_some(len);
        }

        let chunk = if self.is_last() {
            let before = self.file_size.checked_sub(len)?;
            if before % (total - 1) != 0 {
                return None;
            }
            before / (total - 1)
        } else {
            len
        };

        let last = self.file_size.checked_sub(chunk.checked_mul(total - 1)?)?;
        (last >= 1 && last <= chunk).then_some(chunk)
    }

    /// Serialize to wire text.
    #[must_use]
    pub fn encode(&self) -> String {
        render(
            &self.data,
            self.sequence_index,
            self.total_chunks,
            self.checksum,
            &self.filename,
            self.file_size,
        )
    }
}

/// Encode one chunk as wire text.
#[must_use]
pub fn encode_frame(
    slice: &[u8],
    sequence_index: u32,
    total_chunks: u32,
    filename: &str,
    file_size: u64,
) -> String {
    render(
        slice,
        sequence_index,
        total_chunks,
        checksum(slice),
        filename,
        file_size,
    )
}

fn render(
    data: &[u8],
    sequence_index: u32,
    total_chunks: u32,
    crc: u32,
    filename: &str,
    file_size: u64,
) -> String {
    let payload = STANDARD.encode(data);
    format!(
        "{FRAME_MARKER}|seq={sequence_index}|total={total_chunks}|len={}|crc={crc:08X}|fsize={file_size}|name={}\n{payload}",
        payload.len(),
        escape_name(filename),
    )
}

/// CRC-32 (IEEE) of a chunk.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Split a file into chunks of `chunk_size` bytes; the last may be shorter.
///
/// An empty file yields a single empty chunk so that it still travels as one
/// frame.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if `chunk_size` is zero.
pub fn split(data: &[u8], chunk_size: usize) -> Result<Vec<&[u8]>> {
    if chunk_size == 0 {
        return Err(Error::invalid_config("chunk_size", "must be greater than 0"));
    }
    if data.is_empty() {
        return Ok(vec![data]);
    }
    Ok(data.chunks(chunk_size).collect())
}

/// Number of frames needed for a file of `file_size` bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if `chunk_size` is zero or the
/// count does not fit the frame header.
pub fn chunk_count(file_size: u64, chunk_size: usize) -> Result<u32> {
    if chunk_size == 0 {
        return Err(Error::invalid_config("chunk_size", "must be greater than 0"));
    }
    let count = file_size.div_ceil(chunk_size as u64).max(1);
    u32::try_from(count).map_err(|_| {
        Error::invalid_config(
            "chunk_size",
            format!("{count} chunks exceed the frame limit, use a larger chunk"),
        )
    })
}

/// Escape the characters that would break the header line.
///
/// Spaces and tabs at either end are escaped too, so a clipboard that trims
/// lines cannot change the name.
fn escape_name(name: &str) -> String {
    let inner = name.trim_matches([' ', '\t']);
    let lead = name.len() - name.trim_start_matches([' ', '\t']).len();
    let mut out = String::with_capacity(name.len());

    for (pos, c) in name.char_indices() {
        let edge = inner.is_empty() || pos < lead || pos >= lead + inner.len();
        match c {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            ' ' if edge => out.push_str("%20"),
            '\t' if edge => out.push_str("%09"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_name`]. Returns `None` on a broken escape sequence.
fn unescape_name(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reference_file() {
        let chunks = split(b"0123456789", 4).unwrap();
        assert_eq!(chunks, vec![&b"0123"[..], &b"4567"[..], &b"89"[..]]);
        assert_eq!(chunk_count(10, 4).unwrap(), 3);
    }

    #[test]
    fn test_split_exact_multiple() {
        let chunks = split(b"01234567", 4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 4));
        assert_eq!(chunk_count(8, 4).unwrap(), 2);
    }

    #[test]
    fn test_split_empty_file_is_one_frame() {
        let chunks = split(b"", 4).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
        assert_eq!(chunk_count(0, 4).unwrap(), 1);
    }

    #[test]
    fn test_split_zero_chunk_size() {
        assert!(matches!(
            split(b"abc", 0),
            Err(Error::InvalidConfiguration { .. })
        ));
        assert!(chunk_count(3, 0).is_err());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode_frame(b"4567", 2, 3, "digits.txt", 10);
        let b = encode_frame(b"4567", 2, 3, "digits.txt", 10);
        assert_eq!(a, b);
        assert!(a.starts_with("CLIPFERRY/1|seq=2|total=3|len=8|crc="));
        assert!(a.ends_with("|fsize=10|name=digits.txt\nNDU2Nw=="));
    }

    #[test]
    fn test_encode_frame_matches_frame_encode() {
        let frame = Frame::new(b"89".to_vec(), 3, 3, "digits.txt", 10);
        assert_eq!(encode_frame(b"89", 3, 3, "digits.txt", 10), frame.encode());
    }

    #[test]
    fn test_implied_chunk_len() {
        let frame = |data: &[u8], seq, total, fsize| Frame::new(data.to_vec(), seq, total, "x", fsize);

        assert_eq!(frame(b"0123", 1, 3, 10).implied_chunk_len(), Some(4));
        assert_eq!(frame(b"89", 3, 3, 10).implied_chunk_len(), Some(4));
        assert_eq!(frame(b"0123", 2, 2, 8).implied_chunk_len(), Some(4));
        assert_eq!(frame(b"", 1, 1, 0).implied_chunk_len(), Some(0));

        // Two chunks of 4 cannot hold 10 bytes.
        assert_eq!(frame(b"0123", 1, 2, 10).implied_chunk_len(), None);
        // Nothing left for the last chunk.
        assert_eq!(frame(b"0123", 1, 3, 8).implied_chunk_len(), None);
        // 7 bytes before the last chunk do not split into 2 equal chunks.
        assert_eq!(frame(b"012", 3, 3, 10).implied_chunk_len(), None);
        // Last chunk longer than the others.
        assert_eq!(frame(b"0123", 3, 3, 6).implied_chunk_len(), None);
        // A single chunk must be the whole file.
        assert_eq!(frame(b"01", 1, 1, 4).implied_chunk_len(), None);
    }

    #[test]
    fn test_checksum_is_crc32() {
        // Standard CRC-32 check value.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_roundtrip_reassembles_file() {
        let original: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let chunks = split(&original, 96).unwrap();
        let total = u32::try_from(chunks.len()).unwrap();

        let mut rebuilt = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let index = u32::try_from(i + 1).unwrap();
            let text = encode_frame(chunk, index, total, "blob.bin", 1000);
            let frame = decode_frame(&text).expect("frame should decode");
            assert_eq!(frame.data, *chunk);
            assert_eq!(frame.sequence_index, index);
            assert_eq!(frame.total_chunks, total);
            rebuilt.extend_from_slice(&frame.data);
        }
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_name_escaping_roundtrip() {
        let name = "we|ird%20\nname\r.bin";
        let escaped = escape_name(name);
        assert!(!escaped.contains('|'));
        assert!(!escaped.contains('\n'));
        assert_eq!(unescape_name(&escaped).as_deref(), Some(name));

        let text = encode_frame(b"x", 1, 1, name, 1);
        assert_eq!(decode_frame(&text).unwrap().filename, name);
    }

    #[test]
    fn test_name_edge_whitespace_roundtrip() {
        for name in [" report .pdf ", "\tnotes.txt", "trailing ", "   "] {
            let escaped = escape_name(name);
            assert!(!escaped.starts_with([' ', '\t']), "{escaped:?}");
            assert!(!escaped.ends_with([' ', '\t']), "{escaped:?}");

            let text = encode_frame(b"x", 1, 1, name, 1);
            assert_eq!(decode_frame(&text).unwrap().filename, name);
        }
        assert_eq!(escape_name(" a b "), "%20a b%20");
    }

    #[test]
    fn test_unicode_name_roundtrip() {
        let text = encode_frame(b"x", 1, 1, "보고서 ✓.pdf", 1);
        assert_eq!(decode_frame(&text).unwrap().filename, "보고서 ✓.pdf");
    }

    #[test]
    fn test_unescape_rejects_broken_sequences() {
        assert_eq!(unescape_name("abc%2"), None);
        assert_eq!(unescape_name("abc%zz"), None);
    }
}
