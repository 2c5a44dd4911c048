//! ASCII85Decode stream decoder.

use crate::error::{Result, ValidationError};

/// Decode ASCII85-encoded data (PDF variant).
///
/// Handles the `z` shorthand for four zero bytes, optional `<~`/`~>`
/// markers, embedded whitespace, and a partial final group (padded
/// with `u`, emitting one byte fewer than the group length).
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    // strip <~ prefix and ~> terminator when present
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut group_len = 0usize;

    for (i, &byte) in data.iter().enumerate() {
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c' => {}
            b'z' if group_len == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[group_len] = byte;
                group_len += 1;
                if group_len == 5 {
                    out.extend_from_slice(&decode_group(&group));
                    group_len = 0;
                }
            }
            _ => {
                return Err(ValidationError::FilterDecode {
                    filter: "ASCII85Decode".to_string(),
                    msg: format!("bad character 0x{byte:02X} at index {i}"),
                });
            }
        }
    }

    match group_len {
        0 => {}
        1 => {
            return Err(ValidationError::FilterDecode {
                filter: "ASCII85Decode".to_string(),
                msg: "truncated final group".to_string(),
            });
        }
        n => {
            let mut padded = [b'u'; 5];
            padded[..n].copy_from_slice(&group[..n]);
            let bytes = decode_group(&padded);
            out.extend_from_slice(&bytes[..n - 1]);
        }
    }

    Ok(out)
}

fn decode_group(group: &[u8; 5]) -> [u8; 4] {
    let mut value: u32 = 0;
    for &byte in group {
        value = value.wrapping_mul(85).wrapping_add((byte - b'!') as u32);
    }
    value.to_be_bytes()
}
