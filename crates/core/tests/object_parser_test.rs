//! Object parser tests: object definitions, reference collapse,
//! nesting balance, dictionary pairing, and stream fusing.

mod common;

use common::find;
use fafner_core::{ObjRef, ObjectParser, PdfObject, StringEncoding, ValidationError};

#[test]
fn minimal_object_definition() {
    let def = ObjectParser::new(b"7 0 obj 42 endobj")
        .parse_object_def()
        .unwrap();
    assert_eq!(def.num, 7);
    assert_eq!(def.r#gen, 0);
    assert_eq!(def.value, PdfObject::Int(42));
}

#[test]
fn dictionary_with_indirect_reference() {
    let def = ObjectParser::new(b"1 0 obj << /Length 5 0 R >> endobj")
        .parse_object_def()
        .unwrap();
    let dict = def.value.as_dict().unwrap();
    assert_eq!(dict.len(), 1);
    assert_eq!(dict.get("Length"), Some(&PdfObject::Ref(ObjRef::new(5, 0))));
}

#[test]
fn reference_collapse_inside_array() {
    let obj = ObjectParser::new(b"[ 0 12 0 R /X ]").parse_object().unwrap();
    assert_eq!(
        obj,
        PdfObject::Array(vec![
            PdfObject::Int(0),
            PdfObject::Ref(ObjRef::new(12, 0)),
            PdfObject::Name("X".to_string()),
        ])
    );
}

#[test]
fn nested_containers() {
    let obj = ObjectParser::new(b"<< /A [ 1 << /B (c) >> ] /D null >>")
        .parse_object()
        .unwrap();
    let dict = obj.as_dict().unwrap();
    let arr = dict.get("A").unwrap().as_array().unwrap();
    assert_eq!(arr[0], PdfObject::Int(1));
    let inner = arr[1].as_dict().unwrap();
    assert_eq!(
        inner.get("B"),
        Some(&PdfObject::String {
            text: "c".to_string(),
            encoding: StringEncoding::PdfDoc,
        })
    );
    assert_eq!(dict.get("D"), Some(&PdfObject::Null));
}

#[test]
fn balanced_nesting_returns_counters_to_zero() {
    let mut parser = ObjectParser::new(b"[ << /A [ 1 ] >> ] >>");
    parser.parse_object().unwrap();
    // the stray '>>' after a balanced parse drives the counter negative
    let err = parser.next_token().unwrap_err();
    match err {
        ValidationError::Structural { msg, .. } => assert!(msg.contains("improperly nested")),
        other => panic!("expected structural error, got {other:?}"),
    }
}

#[test]
fn stray_array_close_is_structural_error() {
    let mut parser = ObjectParser::new(b"1 ]");
    parser.parse_object().unwrap();
    assert!(matches!(
        parser.next_token(),
        Err(ValidationError::Structural { .. })
    ));
}

#[test]
fn reset_loose_suppresses_balance_errors() {
    let mut parser = ObjectParser::new(b">> ] 42");
    parser.reset_loose();
    parser.next_token().unwrap().unwrap();
    parser.next_token().unwrap().unwrap();
    assert_eq!(parser.parse_object().unwrap(), PdfObject::Int(42));
}

#[test]
fn dict_close_inside_array_is_structural_error() {
    let err = ObjectParser::new(b"[ 1 >> ]").parse_object().unwrap_err();
    assert!(matches!(err, ValidationError::Structural { .. }));
}

#[test]
fn odd_dictionary_element_count_is_structural_error() {
    let err = ObjectParser::new(b"<< /A >>").parse_object().unwrap_err();
    assert!(matches!(err, ValidationError::Structural { .. }));
}

#[test]
fn non_name_dictionary_key_is_structural_error() {
    let err = ObjectParser::new(b"<< 1 2 >>").parse_object().unwrap_err();
    assert!(matches!(err, ValidationError::Structural { .. }));
}

#[test]
fn malformed_reference_triple_is_structural_error() {
    let err = ObjectParser::new(b"[ (x) 0 R ]").parse_object().unwrap_err();
    assert!(matches!(err, ValidationError::Structural { .. }));
}

#[test]
fn dictionary_stream_fuses_into_stream_object() {
    let data = b"5 0 obj << /Length 5 >>stream\nHello\nendstream endobj";
    let def = ObjectParser::new(data).parse_object_def().unwrap();
    let stream = def.value.as_stream().unwrap();
    assert_eq!(stream.data_offset, find(data, b"Hello"));
    assert_eq!(stream.scanned_length, 5);
    assert_eq!(stream.declared_length(), Some(5));
    assert_eq!(stream.id, Some(ObjRef::new(5, 0)));
}

#[test]
fn comments_are_skipped_between_tokens() {
    let def = ObjectParser::new(b"3 0 obj % the answer\n42 endobj")
        .parse_object_def()
        .unwrap();
    assert_eq!(def.value, PdfObject::Int(42));
}

#[test]
fn excessive_nesting_trips_recursion_guard() {
    let mut data = Vec::new();
    data.extend(std::iter::repeat_n(b'[', 600));
    data.extend(std::iter::repeat_n(b']', 600));
    let err = ObjectParser::new(&data).parse_object().unwrap_err();
    assert!(matches!(err, ValidationError::RecursionGuard(_)));
}

#[test]
fn seek_supports_parsing_at_arbitrary_offsets() {
    let data = b"junk junk 9 0 obj (ok) endobj";
    let mut parser = ObjectParser::new(data);
    parser.seek(find(data, b"9 0 obj"));
    let def = parser.parse_object_def().unwrap();
    assert_eq!(def.num, 9);
    assert_eq!(
        def.value,
        PdfObject::String {
            text: "ok".to_string(),
            encoding: StringEncoding::PdfDoc,
        }
    );
}

#[test]
fn missing_obj_keyword_is_structural_error() {
    let err = ObjectParser::new(b"7 0 << >>").parse_object_def().unwrap_err();
    assert!(matches!(err, ValidationError::Structural { .. }));
}
