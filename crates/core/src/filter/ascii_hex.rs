//! ASCIIHexDecode stream decoder.

use crate::error::{Result, ValidationError};

/// Decode ASCIIHex-encoded data.
///
/// Pairs of hex digits become bytes; whitespace is ignored; `>` ends
/// the data (everything after it is discarded); a dangling final
/// digit is padded with zero. Any other byte is a decode error.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for (i, &byte) in data.iter().enumerate() {
        if byte == b'>' {
            break;
        }
        if matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c') {
            continue;
        }
        match hex_nibble(byte) {
            Some(nibble) => {
                if let Some(high) = pending.take() {
                    out.push((high << 4) | nibble);
                } else {
                    pending = Some(nibble);
                }
            }
            None => {
                return Err(ValidationError::FilterDecode {
                    filter: "ASCIIHexDecode".to_string(),
                    msg: format!("bad hex digit 0x{byte:02X} at index {i}"),
                });
            }
        }
    }

    if let Some(high) = pending {
        out.push(high << 4);
    }

    Ok(out)
}

fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
