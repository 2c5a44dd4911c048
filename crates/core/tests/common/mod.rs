//! Shared helpers for building tiny in-memory PDFs with correct
//! cross-reference offsets.

/// Assemble a classic-xref PDF from `(object number, body)` pairs.
///
/// Object numbers must be dense enough for a single subsection
/// starting at 0; gaps become free entries. `trailer_extra` is spliced
/// into the trailer dictionary after /Size.
pub fn build_pdf(objects: &[(u32, Vec<u8>)], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets: Vec<(u32, usize)> = Vec::new();

    for (num, body) in objects {
        offsets.push((*num, out.len()));
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_pos = out.len();
    let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    out.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for num in 1..=max {
        match offsets.iter().find(|(n, _)| *n == num) {
            Some(&(_, offset)) => {
                out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            max + 1,
            trailer_extra,
            xref_pos
        )
        .as_bytes(),
    );
    out
}

/// Byte offset of the first occurrence of `needle` in `data`.
pub fn find(data: &[u8], needle: &[u8]) -> usize {
    data.windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present")
}
