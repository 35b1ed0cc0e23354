//! Frame validation.
//!
//! The receiver hands every new clipboard snapshot to [`validate`]. Anything
//! that is not a frame comes back as a [`Rejection`]; nothing here panics or
//! returns an [`Error`](crate::Error), whatever the clipboard holds.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use super::{checksum, unescape_name, Frame, FRAME_MARKER, MARKER_FAMILY};

/// Why a clipboard snapshot was not accepted as a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not protocol text at all (someone copied something else)
    #[error("not a clipferry frame")]
    Foreign,

    /// Carries the marker but the header cannot be parsed
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Header parsed but the payload does not match its checksum or length;
    /// usually a snapshot taken while the clipboard was being rewritten
    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),
}

impl Rejection {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Header fields before the payload is looked at.
#[derive(Default)]
struct Header {
    seq: Option<u32>,
    total: Option<u32>,
    len: Option<usize>,
    crc: Option<u32>,
    fsize: Option<u64>,
    name: Option<String>,
}

/// Decide whether `raw` is a frame, and decode it if so.
///
/// # Errors
///
/// Returns a [`Rejection`] describing why the text is not an acceptable frame.
pub fn validate(raw: &str) -> Result<Frame, Rejection> {
    let raw = raw.trim_start_matches('\u{feff}');
    let (header_line, payload) = match raw.split_once('\n') {
        Some((header, payload)) => (header.trim_end_matches('\r'), Some(payload)),
        None => (raw.trim_end(), None),
    };

    let mut fields = header_line.split('|');
    let marker = fields.next().unwrap_or_default();
    if marker != FRAME_MARKER {
        if marker.starts_with(MARKER_FAMILY) {
            return Err(Rejection::malformed(format!(
                "unsupported protocol marker '{marker}'"
            )));
        }
        return Err(Rejection::Foreign);
    }

    let header = parse_header(fields)?;
    let seq = header.seq.ok_or_else(|| missing("seq"))?;
    let total = header.total.ok_or_else(|| missing("total"))?;
    let len = header.len.ok_or_else(|| missing("len"))?;
    let crc = header.crc.ok_or_else(|| missing("crc"))?;
    let file_size = header.fsize.ok_or_else(|| missing("fsize"))?;
    let filename = header.name.ok_or_else(|| missing("name"))?;

    if total == 0 {
        return Err(Rejection::malformed("total must be at least 1"));
    }
    if seq == 0 || seq > total {
        return Err(Rejection::malformed(format!(
            "seq {seq} outside 1..={total}"
        )));
    }

    // A clipboard that trims trailing whitespace turns an empty file's frame
    // into a bare header.
    let payload = match payload {
        Some(payload) => payload.trim(),
        None if len == 0 => "",
        None => return Err(Rejection::malformed("missing payload separator")),
    };

    if payload.len() != len {
        return Err(Rejection::ChecksumMismatch(format!(
            "payload is {} characters, header says {len}",
            payload.len()
        )));
    }

    let data = STANDARD
        .decode(payload)
        .map_err(|e| Rejection::ChecksumMismatch(format!("payload is not valid base64: {e}")))?;

    let actual = checksum(&data);
    if actual != crc {
        return Err(Rejection::ChecksumMismatch(format!(
            "header {crc:08X}, payload {actual:08X}"
        )));
    }

    if data.len() as u64 > file_size {
        return Err(Rejection::malformed(format!(
            "chunk of {} bytes exceeds file size {file_size}",
            data.len()
        )));
    }

    let frame = Frame {
        sequence_index: seq,
        total_chunks: total,
        checksum: crc,
        filename,
        file_size,
        data,
    };

    if frame.implied_chunk_len().is_none() {
        return Err(Rejection::malformed(format!(
            "chunk {seq}/{total} of {} bytes cannot belong to a {file_size}-byte file",
            frame.data.len()
        )));
    }

    Ok(frame)
}

/// Decode wire text into a [`Frame`]; the inverse of
/// [`encode_frame`](super::encode_frame).
///
/// # Errors
///
/// Same as [`validate`].
pub fn decode_frame(text: &str) -> Result<Frame, Rejection> {
    validate(text)
}

fn parse_header<'a>(fields: impl Iterator<Item = &'a str>) -> Result<Header, Rejection> {
    let mut header = Header::default();

    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| Rejection::malformed(format!("field '{field}' has no value")))?;
        let key = key.trim();
        // Names are taken verbatim: their edge whitespace is escaped on encode.
        let value = if key == "name" { value } else { value.trim() };

        let duplicate = match key {
            "seq" => header.seq.replace(number(key, value)?).is_some(),
            "total" => header.total.replace(number(key, value)?).is_some(),
            "len" => header.len.replace(number(key, value)?).is_some(),
            "fsize" => header.fsize.replace(number(key, value)?).is_some(),
            "crc" => {
                if value.len() != 8 {
                    return Err(Rejection::malformed(format!("crc '{value}' is not 8 hex digits")));
                }
                let crc = u32::from_str_radix(value, 16)
                    .map_err(|_| Rejection::malformed(format!("crc '{value}' is not hex")))?;
                header.crc.replace(crc).is_some()
            }
            "name" => {
                let name = unescape_name(value)
                    .ok_or_else(|| Rejection::malformed("name has a broken escape sequence"))?;
                header.name.replace(name).is_some()
            }
            // Unknown keys are tolerated so newer senders can add fields.
            _ => false,
        };

        if duplicate {
            return Err(Rejection::malformed(format!("duplicate field '{key}'")));
        }
    }

    Ok(header)
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Rejection> {
    value
        .parse()
        .map_err(|_| Rejection::malformed(format!("{key} '{value}' is not a number")))
}

fn missing(key: &str) -> Rejection {
    Rejection::malformed(format!("missing field '{key}'"))
}
