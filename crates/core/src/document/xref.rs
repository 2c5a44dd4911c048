//! Cross-reference parsing: classic tables and xref streams.
//!
//! The object map this module builds is the only index through which
//! indirect objects are located. Entries point either at a byte offset
//! in the file or into a compressed object stream (PDF 1.5+).

use crate::error::{Result, ValidationError};
use crate::filter;
use crate::model::object::{Dict, PdfObject};
use crate::parser::object_parser::ObjectParser;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Where an indirect object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Byte offset of the `N G obj` header in the file.
    Offset(usize),
    /// Index within a compressed object stream.
    InStream { container: u32, index: usize },
}

/// One cross-reference entry.
#[derive(Debug, Clone, Copy)]
pub struct XrefEntry {
    pub r#gen: u16,
    pub loc: Location,
}

/// Mapping from object number to location, with the accumulated
/// trailer dictionary. Newer sections shadow older ones: an entry or
/// trailer key already present is never overwritten while following
/// the `Prev` chain.
#[derive(Debug, Default)]
pub struct ObjectMap {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dict,
    repaired: bool,
}

impl ObjectMap {
    pub fn get(&self, num: u32) -> Option<&XrefEntry> {
        self.entries.get(&num)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The accumulated trailer dictionary (newest keys win).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// All known object numbers, in no particular order.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Whether this map came from the fallback object scan rather than
    /// an intact cross-reference table.
    pub fn repaired(&self) -> bool {
        self.repaired
    }

    pub(crate) fn mark_repaired(&mut self) {
        self.repaired = true;
    }

    pub(crate) fn insert(&mut self, num: u32, entry: XrefEntry) {
        self.entries.insert(num, entry);
    }

    fn insert_if_absent(&mut self, num: u32, entry: XrefEntry) {
        self.entries.entry(num).or_insert(entry);
    }

    pub(crate) fn merge_trailer(&mut self, dict: &Dict) {
        for (key, value) in dict {
            if !self.trailer.contains_key(key) {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Build the object map for a document: locate `startxref`, follow the
/// section chain, and fall back to a full object scan when no usable
/// cross-reference data exists.
pub(crate) fn load(data: &[u8]) -> Result<ObjectMap> {
    let from_xref = find_startxref(data).and_then(|pos| load_sections(data, pos));
    match from_xref {
        Ok(map) if !map.is_empty() => Ok(map),
        Ok(_) => {
            debug!("cross-reference sections yielded no entries, scanning for objects");
            super::repair::scan(data)
        }
        Err(e) => {
            debug!(error = %e, "cross-reference parse failed, scanning for objects");
            super::repair::scan(data)
        }
    }
}

/// Find the `startxref` offset by scanning the file tail.
fn find_startxref(data: &[u8]) -> Result<usize> {
    let needle = b"startxref";
    if data.len() < needle.len() {
        return Err(ValidationError::NoXref);
    }

    let search_start = data.len().saturating_sub(1024);
    let hay = &data[search_start..];
    let mut found = None;
    for pos in 0..=hay.len() - needle.len() {
        if &hay[pos..pos + needle.len()] == needle {
            found = Some(search_start + pos);
        }
    }
    let i = found.ok_or(ValidationError::NoXref)?;

    let rest = &data[i + needle.len()..];
    let mut pos = 0;
    while pos < rest.len() && matches!(rest[pos], b' ' | b'\r' | b'\n') {
        pos += 1;
    }
    let mut end = pos;
    while end < rest.len() && rest[end].is_ascii_digit() {
        end += 1;
    }
    if end == pos {
        return Err(ValidationError::NoXref);
    }
    std::str::from_utf8(&rest[pos..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ValidationError::NoXref)
}

/// Follow the section chain from `startxref`, including hybrid-file
/// `XRefStm` pointers, guarding against offset loops.
fn load_sections(data: &[u8], start: usize) -> Result<ObjectMap> {
    let mut map = ObjectMap::default();
    let mut visited = HashSet::new();
    let mut pos = start;

    while visited.insert(pos) {
        let trailer = load_section_at(data, pos, &mut map)?;

        let xref_stm = trailer
            .get("XRefStm")
            .and_then(|p| p.as_int().ok())
            .map(|n| n as usize);
        let prev = trailer
            .get("Prev")
            .and_then(|p| p.as_int().ok())
            .map(|n| n as usize);

        map.merge_trailer(&trailer);

        if let Some(stm_pos) = xref_stm
            && visited.insert(stm_pos)
        {
            match load_xref_stream(data, stm_pos, &mut map) {
                Ok(stm_trailer) => map.merge_trailer(&stm_trailer),
                Err(e) => warn!(error = %e, offset = stm_pos, "XRefStm section unusable"),
            }
        }

        match prev {
            Some(prev_pos) => pos = prev_pos,
            None => break,
        }
    }

    Ok(map)
}

fn load_section_at(data: &[u8], pos: usize, map: &mut ObjectMap) -> Result<Dict> {
    if pos >= data.len() {
        return Err(ValidationError::Structural {
            offset: pos,
            msg: "cross-reference offset beyond end of file".to_string(),
        });
    }
    if data[pos..].starts_with(b"xref") {
        load_table(data, pos, map)
    } else {
        load_xref_stream(data, pos, map)
    }
}

/// Classic cross-reference table: subsection headers of
/// `start count`, then one 20-byte entry per object.
fn load_table(data: &[u8], pos: usize, map: &mut ObjectMap) -> Result<Dict> {
    let mut cursor = pos + 4; // past "xref"

    loop {
        skip_whitespace(data, &mut cursor);
        if cursor >= data.len() {
            break;
        }
        if data[cursor..].starts_with(b"trailer") {
            cursor += 7;
            break;
        }

        let start_num = read_number(data, &mut cursor)?;
        skip_whitespace(data, &mut cursor);
        let count = read_number(data, &mut cursor)?;
        skip_to_next_line(data, &mut cursor);

        let mut base_num = start_num;
        for i in 0..count {
            let offset = read_number(data, &mut cursor)?;
            skip_spaces(data, &mut cursor);
            let r#gen = read_number(data, &mut cursor)?;
            skip_spaces(data, &mut cursor);
            let marker = if cursor < data.len() {
                data[cursor]
            } else {
                b'f'
            };
            cursor += 1;
            skip_to_next_line(data, &mut cursor);

            // Some writers start the first subsection at 1 but still
            // emit the object-0 free entry; realign so the entries
            // that follow land on their true numbers.
            if i == 0 && base_num > 0 && marker == b'f' && offset == 0 && r#gen == 65535 {
                base_num -= 1;
            }

            if marker == b'n' {
                map.insert_if_absent(
                    (base_num + i) as u32,
                    XrefEntry {
                        r#gen: r#gen.clamp(0, u16::MAX as i64) as u16,
                        loc: Location::Offset(offset as usize),
                    },
                );
            }
        }
    }

    skip_whitespace(data, &mut cursor);
    let mut parser = ObjectParser::new(data);
    parser.seek(cursor);
    match parser.parse_object() {
        Ok(PdfObject::Dict(dict)) => Ok(dict),
        Ok(_) | Err(_) => {
            warn!(offset = cursor, "trailer dictionary unusable");
            Ok(Dict::new())
        }
    }
}

/// Cross-reference stream (PDF 1.5+): a stream object whose decoded
/// content packs fixed-width entries described by /W, covering the
/// object ranges listed by /Index.
fn load_xref_stream(data: &[u8], pos: usize, map: &mut ObjectMap) -> Result<Dict> {
    let mut parser = ObjectParser::new(data);
    parser.seek(pos);
    let def = parser.parse_object_def()?;
    let stream = def.value.as_stream()?;

    let widths = stream
        .get("W")
        .ok_or_else(|| ValidationError::SemanticInvalid("xref stream missing /W".to_string()))?
        .as_array()?;
    if widths.len() != 3 {
        return Err(ValidationError::SemanticInvalid(
            "/W must have 3 elements".to_string(),
        ));
    }
    let w0 = widths[0].as_int()? as usize;
    let w1 = widths[1].as_int()? as usize;
    let w2 = widths[2].as_int()? as usize;
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(ValidationError::SemanticInvalid(
            "/W entries sum to zero".to_string(),
        ));
    }

    let size = stream
        .get("Size")
        .ok_or_else(|| ValidationError::SemanticInvalid("xref stream missing /Size".to_string()))?
        .as_int()? as usize;

    let index: Vec<(u32, usize)> = match stream.get("Index") {
        Some(idx) => {
            let arr = idx.as_array()?;
            let mut pairs = Vec::new();
            let mut i = 0;
            while i + 1 < arr.len() {
                pairs.push((arr[i].as_int()? as u32, arr[i + 1].as_int()? as usize));
                i += 2;
            }
            pairs
        }
        None => vec![(0, size)],
    };

    let end = stream
        .data_offset
        .checked_add(stream.scanned_length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| ValidationError::Structural {
            offset: stream.data_offset,
            msg: "xref stream data out of range".to_string(),
        })?;
    let raw = &data[stream.data_offset..end];
    // no object map exists yet, so indirect filter entries stay opaque
    let specs = filter::specs_from_dict(&stream.dict, &|obj| Ok(obj.clone()))?;
    let decoded = filter::decode_all(raw, &specs)?;

    let mut data_pos = 0;
    for (start_num, count) in index {
        for i in 0..count {
            if data_pos + entry_size > decoded.len() {
                break;
            }
            let num = start_num + i as u32;
            let entry_type = if w0 > 0 {
                read_be_int(&decoded[data_pos..data_pos + w0])
            } else {
                1
            };
            let field1 = read_be_int(&decoded[data_pos + w0..data_pos + w0 + w1]);
            let field2 = read_be_int(&decoded[data_pos + w0 + w1..data_pos + entry_size]);
            data_pos += entry_size;

            match entry_type {
                0 => {} // free
                1 => map.insert_if_absent(
                    num,
                    XrefEntry {
                        r#gen: field2.min(u16::MAX as u64) as u16,
                        loc: Location::Offset(field1 as usize),
                    },
                ),
                2 => map.insert_if_absent(
                    num,
                    XrefEntry {
                        r#gen: 0,
                        loc: Location::InStream {
                            container: field1 as u32,
                            index: field2 as usize,
                        },
                    },
                ),
                _ => {}
            }
        }
    }

    let mut trailer = Dict::new();
    for (key, value) in &stream.dict {
        if !matches!(
            key.as_str(),
            "Length" | "Filter" | "DecodeParms" | "DP" | "W" | "Index"
        ) {
            trailer.insert(key.clone(), value.clone());
        }
    }
    Ok(trailer)
}

fn read_be_int(bytes: &[u8]) -> u64 {
    let mut val: u64 = 0;
    for &b in bytes {
        val = (val << 8) | (b as u64);
    }
    val
}

fn skip_whitespace(data: &[u8], cursor: &mut usize) {
    while *cursor < data.len() && matches!(data[*cursor], b' ' | b'\t' | b'\r' | b'\n') {
        *cursor += 1;
    }
}

fn skip_spaces(data: &[u8], cursor: &mut usize) {
    while *cursor < data.len() && data[*cursor] == b' ' {
        *cursor += 1;
    }
}

fn skip_to_next_line(data: &[u8], cursor: &mut usize) {
    while *cursor < data.len() && !matches!(data[*cursor], b'\r' | b'\n') {
        *cursor += 1;
    }
    while *cursor < data.len() && matches!(data[*cursor], b'\r' | b'\n') {
        *cursor += 1;
    }
}

fn read_number(data: &[u8], cursor: &mut usize) -> Result<i64> {
    let start = *cursor;
    let negative = if *cursor < data.len() && data[*cursor] == b'-' {
        *cursor += 1;
        true
    } else {
        false
    };
    let digits_start = *cursor;
    while *cursor < data.len() && data[*cursor].is_ascii_digit() {
        *cursor += 1;
    }
    if *cursor == digits_start {
        return Err(ValidationError::Structural {
            offset: start,
            msg: "expected number in cross-reference section".to_string(),
        });
    }
    let value: i64 = std::str::from_utf8(&data[digits_start..*cursor])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ValidationError::Structural {
            offset: start,
            msg: "unreadable number in cross-reference section".to_string(),
        })?;
    Ok(if negative { -value } else { value })
}
