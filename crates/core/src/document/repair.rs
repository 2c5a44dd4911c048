//! Fallback object-map recovery.
//!
//! When no usable cross-reference data exists, every `N G obj` header
//! in the file is indexed directly. Later definitions shadow earlier
//! ones, matching how incremental updates append to a file.

use super::xref::{Location, ObjectMap, XrefEntry};
use crate::error::{Result, ValidationError};
use crate::model::object::PdfObject;
use crate::parser::object_parser::ObjectParser;
use crate::parser::token::Keyword;
use regex::bytes::Regex;
use tracing::debug;

/// Scan the whole file for object headers and the last trailer.
pub(crate) fn scan(data: &[u8]) -> Result<ObjectMap> {
    let re = Regex::new(r"(\d+)\s+(\d+)\s+obj\b").unwrap();
    let mut map = ObjectMap::default();
    map.mark_repaired();

    for cap in re.captures_iter(data) {
        let num = match std::str::from_utf8(&cap[1])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(value) if value <= u32::MAX as u64 => value as u32,
            _ => continue,
        };
        let r#gen = match std::str::from_utf8(&cap[2])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(value) if value <= u16::MAX as u64 => value as u16,
            _ => continue,
        };
        let offset = cap.get(0).map(|m| m.start()).unwrap_or(0);
        map.insert(
            num,
            XrefEntry {
                r#gen,
                loc: Location::Offset(offset),
            },
        );
    }

    if map.is_empty() {
        return Err(ValidationError::NoXref);
    }
    debug!(objects = map.len(), "object map recovered by scan");

    if let Some(pos) = find_last_trailer(data) {
        let mut parser = ObjectParser::new(data);
        parser.seek(pos);
        // consume the "trailer" keyword, then read its dictionary
        if let Ok(Some(tok)) = parser.next_token()
            && tok.is_keyword(&Keyword::Trailer)
            && let Ok(PdfObject::Dict(dict)) = parser.parse_object()
        {
            map.merge_trailer(&dict);
        }
    }

    Ok(map)
}

fn find_last_trailer(data: &[u8]) -> Option<usize> {
    let needle = b"trailer";
    (0..data.len().saturating_sub(needle.len()))
        .rev()
        .find(|&i| &data[i..i + needle.len()] == needle)
}
