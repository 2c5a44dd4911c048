//! Filter pipeline tests: chain construction and ordering, streaming
//! reads with skip, predictor reversal behind Flate, and failure
//! scoping.

use bytes::Bytes;
use fafner_core::filter::predictor::{self, PredictorParams};
use fafner_core::filter::{self, FilterSpec};
use fafner_core::{Dict, PdfObject, ValidationError};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn flate_spec(params: Option<Dict>) -> FilterSpec {
    FilterSpec {
        name: "FlateDecode".to_string(),
        params,
    }
}

fn predictor_parms(predictor: i64, columns: i64) -> Dict {
    let mut parms = Dict::new();
    parms.insert("Predictor".to_string(), PdfObject::Int(predictor));
    parms.insert("Columns".to_string(), PdfObject::Int(columns));
    parms
}

#[test]
fn flate_chain_streams_decoded_bytes() {
    let plain = b"one plain stream body, long enough to compress";
    let raw = Bytes::from(deflate(plain));
    let mut reader = filter::chain(raw, &[flate_spec(None)]).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, plain);
}

#[test]
fn stream_reader_skip_advances_without_output() {
    let plain = b"0123456789abcdef";
    let raw = Bytes::from(deflate(plain));
    let mut reader = filter::chain(raw, &[flate_spec(None)]).unwrap();
    assert_eq!(reader.skip(10).unwrap(), 10);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"abcdef");
    // skipping past the end reports the shorter distance
    assert_eq!(reader.skip(5).unwrap(), 0);
}

#[test]
fn flate_with_up_predictor_round_trips() {
    // rows of 4, Up-filtered: each encoded row is the delta from the row above
    let rows: [[u8; 4]; 3] = [[10, 20, 30, 40], [12, 22, 32, 42], [11, 21, 31, 41]];
    let mut encoded = Vec::new();
    let mut prev = [0u8; 4];
    for row in &rows {
        encoded.push(2u8); // Up
        for i in 0..4 {
            encoded.push(row[i].wrapping_sub(prev[i]));
        }
        prev = *row;
    }

    let raw = Bytes::from(deflate(&encoded));
    let specs = [flate_spec(Some(predictor_parms(12, 4)))];
    let mut reader = filter::chain(raw.clone(), &specs).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    let expected: Vec<u8> = rows.iter().flatten().copied().collect();
    assert_eq!(out, expected);

    // eager path agrees with the streaming path
    assert_eq!(filter::decode_all(&raw, &specs).unwrap(), expected);
}

#[test]
fn filters_apply_in_array_order() {
    // raw bytes are hex(deflate(plain)): ASCIIHexDecode runs first,
    // FlateDecode second
    let plain = b"filters compose left to right";
    let mut hex_encoded = hex::encode(deflate(plain)).into_bytes();
    hex_encoded.push(b'>');

    let specs = [
        FilterSpec {
            name: "ASCIIHexDecode".to_string(),
            params: None,
        },
        flate_spec(None),
    ];
    assert_eq!(filter::decode_all(&hex_encoded, &specs).unwrap(), plain);

    let mut reader = filter::chain(Bytes::from(hex_encoded), &specs).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, plain);
}

#[test]
fn run_length_in_chain() {
    let specs = [FilterSpec {
        name: "RunLengthDecode".to_string(),
        params: None,
    }];
    let decoded = filter::decode_all(&[2, b'a', b'b', b'c', 255, b'z', 128], &specs).unwrap();
    assert_eq!(decoded, b"abczz");
}

#[test]
fn unsupported_filter_is_reported_not_fatal() {
    let specs = [FilterSpec {
        name: "DCTDecode".to_string(),
        params: None,
    }];
    let err = filter::decode_all(b"\xFF\xD8", &specs).unwrap_err();
    match &err {
        ValidationError::FilterDecode { filter, .. } => assert_eq!(filter, "DCTDecode"),
        other => panic!("expected filter error, got {other:?}"),
    }
    assert!(err.is_recoverable());
}

#[test]
fn average_and_paeth_predictors_reverse_hand_encoded_rows() {
    let params = PredictorParams {
        predictor: 12,
        colors: 1,
        bits_per_component: 8,
        columns: 3,
    };
    // Average row over zero prev: out[i] = raw[i] + floor(left/2)
    // raw [10, 10, 10] -> [10, 15, 17]
    let avg = predictor::apply(&[3, 10, 10, 10], &params).unwrap();
    assert_eq!(avg, vec![10, 15, 17]);

    // Paeth with zero prev row degenerates to Sub
    // raw [5, 5, 5] -> [5, 10, 15]
    let paeth = predictor::apply(&[4, 5, 5, 5], &params).unwrap();
    assert_eq!(paeth, vec![5, 10, 15]);
}

#[test]
fn corrupt_flate_yields_partial_output_eagerly() {
    let plain = b"recoverable stream contents that inflate fine until the tail";
    let mut packed = deflate(plain);
    packed.truncate(packed.len() - 2);
    let out = filter::decode_all(&packed, &[flate_spec(None)]).unwrap();
    assert!(!out.is_empty());
    assert!(plain.starts_with(&out[..out.len().min(plain.len())]));
}
