//! Document-level tests: cross-reference parsing, object resolution,
//! stream decoding, object streams, repair fallback, and the
//! document-wide compliance flag.

mod common;

use common::build_pdf;
use fafner_core::{Document, PdfObject, ValidationError};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

fn minimal_doc() -> Vec<u8> {
    build_pdf(
        &[
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec()),
            (
                3,
                b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_vec(),
            ),
            (4, b"<< /Length 5 >>stream\nHello\nendstream".to_vec()),
        ],
        "/Root 1 0 R",
    )
}

#[test]
fn open_resolves_catalog_through_trailer_root() {
    let doc = Document::open(minimal_doc()).unwrap();
    assert_eq!(
        doc.catalog().get("Type"),
        Some(&PdfObject::Name("Catalog".to_string()))
    );
    assert!(!doc.object_map().repaired());
    assert_eq!(doc.object_map().len(), 4);
}

#[test]
fn resolve_indirect_reference_through_object_map() {
    let doc = Document::open(minimal_doc()).unwrap();
    let pages_ref = doc.catalog().get("Pages").unwrap();
    let pages = doc.resolve(pages_ref).unwrap();
    assert_eq!(
        pages.as_dict().unwrap().get("Count"),
        Some(&PdfObject::Int(1))
    );
    // non-reference objects come back unchanged without I/O
    let same = doc.resolve(&PdfObject::Int(9)).unwrap();
    assert_eq!(*same, PdfObject::Int(9));
}

#[test]
fn stream_decoding_without_filters() {
    let doc = Document::open(minimal_doc()).unwrap();
    let obj = doc.get_object(4).unwrap();
    let stream = obj.as_stream().unwrap();
    assert_eq!(doc.decode_stream(stream).unwrap(), b"Hello");
    doc.check_stream_length(stream).unwrap();

    let mut reader = doc.stream_reader(stream).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"Hello");
}

#[test]
fn declared_length_mismatch_is_semantic_invalid() {
    let data = build_pdf(
        &[(1, b"<< /Length 99 >>stream\nHello\nendstream".to_vec())],
        "",
    );
    let doc = Document::open(data).unwrap();
    let obj = doc.get_object(1).unwrap();
    let err = doc.check_stream_length(obj.as_stream().unwrap()).unwrap_err();
    assert!(matches!(err, ValidationError::SemanticInvalid(_)));
    assert!(err.is_recoverable());
    // decoding still works off the scanned length
    assert_eq!(doc.decode_stream(obj.as_stream().unwrap()).unwrap(), b"Hello");
}

#[test]
fn indirect_length_resolves_through_document() {
    let data = build_pdf(
        &[
            (1, b"<< /Length 2 0 R >>stream\nHello\nendstream".to_vec()),
            (2, b"5".to_vec()),
        ],
        "",
    );
    let doc = Document::open(data).unwrap();
    let obj = doc.get_object(1).unwrap();
    doc.check_stream_length(obj.as_stream().unwrap()).unwrap();
}

#[test]
fn flate_stream_decodes() {
    let plain = b"page content, compressed with zlib for the test";
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain).unwrap();
    let packed = encoder.finish().unwrap();

    let mut body = format!("<< /Length {} /Filter /FlateDecode >>stream\n", packed.len())
        .into_bytes();
    body.extend_from_slice(&packed);
    body.extend_from_slice(b"\nendstream");

    let doc = Document::open(build_pdf(&[(1, body)], "")).unwrap();
    let obj = doc.get_object(1).unwrap();
    assert_eq!(doc.decode_stream(obj.as_stream().unwrap()).unwrap(), plain);
}

#[test]
fn missing_object_reports_not_found() {
    let doc = Document::open(minimal_doc()).unwrap();
    assert!(matches!(
        doc.get_object(99).unwrap_err(),
        ValidationError::ObjectNotFound(99)
    ));
    assert!(matches!(
        doc.get_object(0).unwrap_err(),
        ValidationError::ObjectNotFound(0)
    ));
}

#[test]
fn object_number_mismatch_is_structural() {
    // hand-built file whose xref points object 2 at object 1's header
    let mut data = b"%PDF-1.4\n".to_vec();
    let off1 = data.len();
    data.extend_from_slice(b"1 0 obj 42 endobj\n");
    let xref_pos = data.len();
    data.extend_from_slice(
        format!(
            "xref\n0 3\n0000000000 65535 f \n{off1:010} 00000 n \n{off1:010} 00000 n \n"
        )
        .as_bytes(),
    );
    data.extend_from_slice(
        format!("trailer\n<< /Size 3 >>\nstartxref\n{xref_pos}\n%%EOF\n").as_bytes(),
    );

    let doc = Document::open(data).unwrap();
    assert_eq!(*doc.get_object(1).unwrap(), PdfObject::Int(42));
    assert!(matches!(
        doc.get_object(2).unwrap_err(),
        ValidationError::Structural { .. }
    ));
}

#[test]
fn broken_xref_falls_back_to_repair_scan() {
    let mut data = b"%PDF-1.4\n".to_vec();
    data.extend_from_slice(b"1 0 obj << /Kind (scanned) >> endobj\n");
    data.extend_from_slice(b"2 0 obj 7 endobj\n");
    data.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
    // no xref table, no startxref

    let doc = Document::open(data).unwrap();
    assert!(doc.object_map().repaired());
    assert_eq!(*doc.get_object(2).unwrap(), PdfObject::Int(7));
    assert_eq!(
        doc.catalog().get("Kind"),
        Some(&PdfObject::String {
            text: "scanned".to_string(),
            encoding: fafner_core::StringEncoding::PdfDoc,
        })
    );
}

/// Build a PDF 1.5 file with an uncompressed cross-reference stream
/// and an object stream holding two compressed objects.
fn objstm_doc(container_of_6: Option<u32>) -> Vec<u8> {
    let mut out = b"%PDF-1.5\n".to_vec();

    let off5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Catalog >> endobj\n");

    // object stream holding objects 3 and 4
    let obj3 = b"<< /X 1 >>";
    let obj4 = b"99";
    let header = format!("3 0 4 {} ", obj3.len() + 1);
    let first = header.len();
    let mut content = header.into_bytes();
    content.extend_from_slice(obj3);
    content.push(b' ');
    content.extend_from_slice(obj4);

    let off2 = out.len();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /ObjStm /N 2 /First {first} /Length {} >>stream\n",
            content.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&content);
    out.extend_from_slice(b"\nendstream endobj\n");

    // cross-reference stream: W [1 2 2], entries end on a zero byte so
    // the endstream scan never mistakes them for an end-of-line
    let xref_pos = out.len();
    let size = if container_of_6.is_some() { 7 } else { 6 };
    let mut entries = Vec::new();
    let mut push = |t: u8, f1: u64, f2: u64| {
        entries.push(t);
        entries.extend_from_slice(&(f1 as u16).to_be_bytes());
        entries.extend_from_slice(&(f2 as u16).to_be_bytes());
    };
    push(0, 0, 0xFFFF);
    push(1, xref_pos as u64, 0);
    push(1, off2 as u64, 0);
    push(2, 2, 0);
    push(2, 2, 1);
    push(1, off5 as u64, 0);
    if let Some(container) = container_of_6 {
        push(2, container as u64, 0);
    }

    out.extend_from_slice(
        format!(
            "1 0 obj << /Type /XRef /Size {size} /W [1 2 2] /Root 5 0 R /Length {} >>stream\n",
            entries.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&entries);
    out.extend_from_slice(b"\nendstream endobj\n");
    out.extend_from_slice(format!("startxref\n{xref_pos}\n%%EOF\n").as_bytes());
    out
}

#[test]
fn xref_stream_and_object_stream_resolution() {
    let doc = Document::open(objstm_doc(None)).unwrap();
    assert_eq!(
        doc.catalog().get("Type"),
        Some(&PdfObject::Name("Catalog".to_string()))
    );

    let obj3 = doc.get_object(3).unwrap();
    assert_eq!(obj3.as_dict().unwrap().get("X"), Some(&PdfObject::Int(1)));
    let obj4 = doc.get_object(4).unwrap();
    assert_eq!(*obj4, PdfObject::Int(99));
}

#[test]
fn self_containing_object_stream_trips_recursion_guard() {
    // object 6 claims to live inside object stream 6
    let doc = Document::open(objstm_doc(Some(6))).unwrap();
    let err = doc.get_object(6).unwrap_err();
    assert!(matches!(err, ValidationError::RecursionGuard(_)));
}

#[test]
fn compliance_flag_survives_and_resets() {
    // bare CR after the stream keyword is a compliance violation
    let data = build_pdf(
        &[(1, b"<< /Length 2 >>stream\rHi\nendstream".to_vec())],
        "",
    );
    let doc = Document::open(data).unwrap();
    assert!(doc.pdfa_compliant());
    let obj = doc.get_object(1).unwrap();
    assert_eq!(obj.as_stream().unwrap().scanned_length, 2);
    assert!(!doc.pdfa_compliant());
    doc.reset_pdfa();
    assert!(doc.pdfa_compliant());
}

#[test]
fn repeated_resolution_is_cached() {
    let doc = Document::open(minimal_doc()).unwrap();
    let first = doc.get_object(3).unwrap();
    let second = doc.get_object(3).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));
}
