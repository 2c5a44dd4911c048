//! FlateDecode stream decoder.

use flate2::{Decompress, FlushDecompress, Status};
use std::io::Read;

/// Inflate zlib-wrapped data.
///
/// Falls back to a lenient byte-at-a-time pass for corrupted streams,
/// returning the bytes produced before the point of failure (commonly
/// everything but a damaged checksum tail).
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_err() {
        out = decode_corrupted(data);
    }
    out
}

/// Best-effort inflate for corrupted streams: feed one byte at a time
/// and keep whatever output the decoder yields before failing.
pub(crate) fn decode_corrupted(data: &[u8]) -> Vec<u8> {
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        if consumed == 0 {
            i += 1;
        } else {
            i += consumed;
        }
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}
