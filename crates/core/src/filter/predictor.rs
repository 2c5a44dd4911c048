//! Predictor reversal for Flate-compressed streams.
//!
//! A predictor delta-encodes each row before compression; decoding
//! must reverse it row by row. PNG predictors (codes >= 10) prefix
//! every row with a filter-type byte selecting the algorithm for that
//! row; predictor 2 is TIFF horizontal differencing with no row
//! prefix. Two row buffers are swapped each row so the previous row
//! is always available without re-reading.

use crate::error::{Result, ValidationError};
use crate::model::object::Dict;
use std::io::{self, Cursor, Read};

/// Decode parameters relevant to prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: u8,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    /// Read /Predictor, /Colors, /BitsPerComponent, /Columns with their
    /// specified defaults.
    pub fn from_dict(dict: &Dict) -> Self {
        let get = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|obj| obj.as_int().ok())
                .unwrap_or(default)
        };
        Self {
            predictor: get("Predictor", 1).clamp(1, 15) as u8,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
            columns: get("Columns", 1).max(1) as usize,
        }
    }

    /// Predictor 1 (or absent) means no transformation.
    pub fn is_identity(&self) -> bool {
        self.predictor <= 1
    }

    /// Bytes per complete pixel, at least one.
    fn bytes_per_pixel(&self) -> usize {
        std::cmp::max(1, self.colors * self.bits_per_component / 8)
    }

    /// Bytes per row, rounded up for sub-byte components.
    fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

/// Streaming predictor reversal over an inflate source.
///
/// End of data is signalled when a full row can no longer be filled
/// from the underlying stream.
pub struct PredictorReader<R> {
    inner: R,
    png: bool,
    bpp: usize,
    row_bytes: usize,
    /// Previously decoded row ("above"); swapped with `row` each fill.
    prev: Vec<u8>,
    /// Scratch row being decoded, then served to the caller.
    row: Vec<u8>,
    served: usize,
    done: bool,
}

impl<R: Read> PredictorReader<R> {
    pub fn new(inner: R, params: &PredictorParams) -> Self {
        let row_bytes = params.row_bytes();
        Self {
            inner,
            png: params.predictor >= 10,
            bpp: params.bytes_per_pixel(),
            row_bytes,
            prev: vec![0u8; row_bytes],
            row: vec![0u8; row_bytes],
            // the initial zero row is prediction context, never output
            served: row_bytes,
            done: false,
        }
    }

    fn fill_row(&mut self) -> io::Result<()> {
        let filter_type = if self.png {
            let mut ft = [0u8; 1];
            if read_full(&mut self.inner, &mut ft)? < 1 {
                self.done = true;
                return Ok(());
            }
            ft[0]
        } else {
            0
        };

        let mut raw = vec![0u8; self.row_bytes];
        if read_full(&mut self.inner, &mut raw)? < self.row_bytes {
            self.done = true;
            return Ok(());
        }

        if self.png {
            self.decode_png_row(filter_type, &raw);
        } else {
            self.decode_tiff_row(&raw);
        }

        // the freshly decoded row becomes "above" for the next one
        std::mem::swap(&mut self.prev, &mut self.row);
        self.served = 0;
        Ok(())
    }

    fn decode_png_row(&mut self, filter_type: u8, raw: &[u8]) {
        let bpp = self.bpp;
        let cur = &mut self.row;
        match filter_type {
            0 => cur.copy_from_slice(raw),
            1 => {
                // Sub: left neighbor
                for i in 0..raw.len() {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    cur[i] = raw[i].wrapping_add(left);
                }
            }
            2 => {
                // Up: value from the previous row
                for i in 0..raw.len() {
                    cur[i] = raw[i].wrapping_add(self.prev[i]);
                }
            }
            3 => {
                // Average of left and above
                for i in 0..raw.len() {
                    let left = if i >= bpp { cur[i - bpp] as u16 } else { 0 };
                    let above = self.prev[i] as u16;
                    cur[i] = raw[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..raw.len() {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    let above = self.prev[i];
                    let upper_left = if i >= bpp { self.prev[i - bpp] } else { 0 };
                    cur[i] = raw[i].wrapping_add(paeth(left, above, upper_left));
                }
            }
            // unknown filter byte: pass the row through unchanged
            _ => cur.copy_from_slice(raw),
        }
    }

    fn decode_tiff_row(&mut self, raw: &[u8]) {
        let bpp = self.bpp;
        let cur = &mut self.row;
        for i in 0..raw.len() {
            let left = if i >= bpp { cur[i - bpp] } else { 0 };
            cur[i] = raw[i].wrapping_add(left);
        }
    }
}

impl<R: Read> Read for PredictorReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.served < self.prev.len() {
                let n = (self.prev.len() - self.served).min(buf.len());
                buf[..n].copy_from_slice(&self.prev[self.served..self.served + n]);
                self.served += n;
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }
            self.fill_row()?;
        }
    }
}

/// Paeth predictor: whichever of left/above/upper-left minimizes
/// the distance to `left + above - upper_left`.
const fn paeth(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// Read until `buf` is full or the source is exhausted; returns the
/// number of bytes actually read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Eager convenience over the streaming reader.
pub fn apply(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let mut reader = PredictorReader::new(Cursor::new(data), params);
    let mut out = Vec::with_capacity(data.len());
    reader
        .read_to_end(&mut out)
        .map_err(|e| ValidationError::FilterDecode {
            filter: "Predictor".to_string(),
            msg: e.to_string(),
        })?;
    Ok(out)
}
