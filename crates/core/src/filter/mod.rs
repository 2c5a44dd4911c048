//! Stream filter pipeline.
//!
//! A stream's `/Filter` entry names zero or more decoding filters,
//! applied in array order when the content is actually read. The
//! pipeline layers one reader adapter per filter over the buffered raw
//! bytes; `chain` builds the streaming form, `decode_all` the eager
//! form used internally for cross-reference and object streams.

pub mod ascii85;
pub mod ascii_hex;
pub mod flate;
pub mod predictor;
pub mod run_length;

use crate::error::{Result, ValidationError};
use crate::model::object::{Dict, PdfObject};
use bytes::Bytes;
use predictor::{PredictorParams, PredictorReader};
use std::io::{self, Cursor, Read};

/// One entry of a stream's filter list: filter name plus its optional
/// decode-parameters dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub name: String,
    pub params: Option<Dict>,
}

/// Extract the ordered filter list from a stream dictionary.
///
/// `/Filter` may be a single name or an array of names; `/DecodeParms`
/// (or its `/DP` abbreviation) pairs with it positionally. `resolve`
/// materializes indirect entries; callers without an object map pass a
/// clone-through closure and accept that indirect entries stay opaque.
pub fn specs_from_dict<R>(dict: &Dict, resolve: &R) -> Result<Vec<FilterSpec>>
where
    R: Fn(&PdfObject) -> Result<PdfObject>,
{
    let filter_obj = match dict.get("Filter") {
        None => return Ok(Vec::new()),
        Some(f) => resolve(f)?,
    };

    let names: Vec<String> = match filter_obj {
        PdfObject::Name(name) => vec![name],
        PdfObject::Null => Vec::new(),
        PdfObject::Array(arr) => {
            let mut names = Vec::with_capacity(arr.len());
            for item in &arr {
                match resolve(item)? {
                    PdfObject::Name(name) => names.push(name),
                    other => {
                        return Err(ValidationError::SemanticInvalid(format!(
                            "/Filter array entry must be a name, got {}",
                            other.type_name()
                        )));
                    }
                }
            }
            names
        }
        other => {
            return Err(ValidationError::SemanticInvalid(format!(
                "/Filter must be a name or array, got {}",
                other.type_name()
            )));
        }
    };

    let parms_obj = dict.get("DecodeParms").or_else(|| dict.get("DP"));
    let parms: Vec<Option<Dict>> = match parms_obj {
        None => vec![None; names.len()],
        Some(p) => match resolve(p)? {
            PdfObject::Dict(d) => vec![Some(d)],
            PdfObject::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for item in &arr {
                    match resolve(item)? {
                        PdfObject::Dict(d) => out.push(Some(d)),
                        _ => out.push(None),
                    }
                }
                out
            }
            _ => vec![None; names.len()],
        },
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterSpec {
            name,
            params: parms.get(i).cloned().flatten(),
        })
        .collect())
}

/// Decoded-byte reader over a stream's filter chain.
pub struct StreamReader {
    inner: Box<dyn Read>,
}

impl StreamReader {
    /// Advance without materializing output where possible; returns the
    /// number of bytes actually skipped (shorter at end of data).
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        Ok(skipped)
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Layer one reader adapter per filter, in array order, over the
/// buffered raw bytes.
pub fn chain(raw: Bytes, specs: &[FilterSpec]) -> Result<StreamReader> {
    let mut reader: Box<dyn Read> = Box::new(Cursor::new(raw));
    for spec in specs {
        reader = layer_reader(reader, spec)?;
    }
    Ok(StreamReader { inner: reader })
}

fn layer_reader(inner: Box<dyn Read>, spec: &FilterSpec) -> Result<Box<dyn Read>> {
    match spec.name.as_str() {
        "FlateDecode" | "Fl" => {
            let inflated: Box<dyn Read> = Box::new(flate2::read::ZlibDecoder::new(inner));
            let params = predictor_params(spec);
            if params.is_identity() {
                Ok(inflated)
            } else {
                Ok(Box::new(PredictorReader::new(inflated, &params)))
            }
        }
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(TextDecodeReader::new(DecoderKind::AsciiHex, inner))),
        "ASCII85Decode" | "A85" => Ok(Box::new(TextDecodeReader::new(DecoderKind::Ascii85, inner))),
        "RunLengthDecode" | "RL" => {
            Ok(Box::new(TextDecodeReader::new(DecoderKind::RunLength, inner)))
        }
        other => Err(unsupported(other)),
    }
}

/// Apply the full filter list eagerly, producing the decoded bytes.
pub fn decode_all(raw: &[u8], specs: &[FilterSpec]) -> Result<Vec<u8>> {
    let mut data = raw.to_vec();
    for spec in specs {
        data = apply_eager(&data, spec)?;
    }
    Ok(data)
}

fn apply_eager(data: &[u8], spec: &FilterSpec) -> Result<Vec<u8>> {
    match spec.name.as_str() {
        "FlateDecode" | "Fl" => {
            let inflated = flate::decode(data);
            let params = predictor_params(spec);
            if params.is_identity() {
                Ok(inflated)
            } else {
                predictor::apply(&inflated, &params)
            }
        }
        "ASCIIHexDecode" | "AHx" => ascii_hex::decode(data),
        "ASCII85Decode" | "A85" => ascii85::decode(data),
        "RunLengthDecode" | "RL" => run_length::decode(data),
        other => Err(unsupported(other)),
    }
}

fn predictor_params(spec: &FilterSpec) -> PredictorParams {
    spec.params
        .as_ref()
        .map(PredictorParams::from_dict)
        .unwrap_or_default()
}

fn unsupported(name: &str) -> ValidationError {
    ValidationError::FilterDecode {
        filter: name.to_string(),
        msg: "unsupported filter".to_string(),
    }
}

enum DecoderKind {
    AsciiHex,
    Ascii85,
    RunLength,
}

impl DecoderKind {
    fn name(&self) -> &'static str {
        match self {
            Self::AsciiHex => "ASCIIHexDecode",
            Self::Ascii85 => "ASCII85Decode",
            Self::RunLength => "RunLengthDecode",
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::AsciiHex => ascii_hex::decode(data),
            Self::Ascii85 => ascii85::decode(data),
            Self::RunLength => run_length::decode(data),
        }
    }
}

/// Reader adapter for the text-based decoders. Decoding runs once, on
/// first read, over the fully drained source; output is then served
/// incrementally.
struct TextDecodeReader {
    kind: DecoderKind,
    inner: Option<Box<dyn Read>>,
    out: Option<Cursor<Vec<u8>>>,
}

impl TextDecodeReader {
    fn new(kind: DecoderKind, inner: Box<dyn Read>) -> Self {
        Self {
            kind,
            inner: Some(inner),
            out: None,
        }
    }
}

impl Read for TextDecodeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.out.is_none() {
            let mut source = Vec::new();
            if let Some(mut inner) = self.inner.take() {
                inner.read_to_end(&mut source)?;
            }
            let decoded = self
                .kind
                .decode(&source)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            self.out = Some(Cursor::new(decoded));
        }
        self.out
            .as_mut()
            .map(|cursor| cursor.read(buf))
            .unwrap_or(Ok(0))
    }
}
