//! PDF document module - object map, resolution, stream decoding,
//! and document-structure tree walks.
//!
//! - `xref` - cross-reference table/stream parsing (object map)
//! - `repair` - fallback object-map recovery by pattern scan
//! - `page` - page-tree walker
//! - `labels` - page-label number-tree walker
//! - `structure` - structure-tree walker

pub mod labels;
pub mod page;
pub mod repair;
pub mod structure;
pub mod xref;

// Re-export main types for convenience
pub use labels::PageLabelWalker;
pub use page::{PageNode, PageTreeWalker};
pub use structure::{StructNode, StructTreeWalker};
pub use xref::{Location, ObjectMap, XrefEntry};

use crate::error::{Result, ValidationError};
use crate::filter::{self, FilterSpec, StreamReader};
use crate::model::object::{Dict, PdfObject, StreamObject};
use crate::parser::object_parser::ObjectParser;
use bytes::Bytes;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::warn;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// LRU cache of materialized objects, keyed by object number.
struct ObjectCache {
    capacity: usize,
    map: IndexMap<u32, Rc<PdfObject>>,
}

impl ObjectCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, num: u32) -> Option<Rc<PdfObject>> {
        if self.capacity == 0 {
            return None;
        }
        let index = self.map.get_index_of(&num)?;
        let value = Rc::clone(self.map.get_index(index)?.1);
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, num: u32, value: Rc<PdfObject>) {
        if self.capacity == 0 {
            return;
        }
        if self.map.contains_key(&num) {
            self.map.shift_remove(&num);
        }
        self.map.insert(num, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }
}

/// Removes the object number from the in-progress set when a
/// resolution unwinds, normally or through an error.
struct ResolveGuard<'a> {
    set: &'a RefCell<HashSet<u32>>,
    num: u32,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.num);
    }
}

/// One parsed PDF document: the backing bytes, the object map built
/// from its cross-reference data, and the machinery to materialize
/// indirect objects and decode stream content on demand.
///
/// All access is single-threaded; the object cache and the cycle
/// guard use interior mutability so resolution works through `&self`.
pub struct Document {
    data: Bytes,
    map: ObjectMap,
    catalog: Dict,
    cache: RefCell<ObjectCache>,
    /// Object numbers currently being resolved; re-entry means a cycle.
    resolving: RefCell<HashSet<u32>>,
    /// Document-wide "PDF/A compliant so far" flag.
    pdfa: Cell<bool>,
}

impl Document {
    /// Parse the cross-reference data and catalog of a document held
    /// in memory.
    pub fn open(data: impl Into<Bytes>) -> Result<Self> {
        Self::open_with_cache(data, DEFAULT_CACHE_CAPACITY)
    }

    /// As `open`, with an explicit object-cache capacity.
    pub fn open_with_cache(data: impl Into<Bytes>, cache_capacity: usize) -> Result<Self> {
        let data = data.into();
        let map = xref::load(&data)?;
        let mut doc = Self {
            data,
            map,
            catalog: Dict::new(),
            cache: RefCell::new(ObjectCache::new(cache_capacity)),
            resolving: RefCell::new(HashSet::new()),
            pdfa: Cell::new(true),
        };

        if let Some(root) = doc.map.trailer().get("Root").cloned() {
            match doc.resolve(&root) {
                Ok(obj) => match obj.as_dict() {
                    Ok(dict) => doc.catalog = dict.clone(),
                    Err(_) => warn!("trailer /Root is not a dictionary"),
                },
                Err(e) => warn!(error = %e, "trailer /Root does not resolve"),
            }
        }

        Ok(doc)
    }

    /// The raw document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The object map built from the cross-reference data.
    pub fn object_map(&self) -> &ObjectMap {
        &self.map
    }

    /// The accumulated trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.map.trailer()
    }

    /// The document catalog, empty when /Root was absent or unusable.
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// Whether everything parsed so far was PDF/A compliant.
    pub fn pdfa_compliant(&self) -> bool {
        self.pdfa.get()
    }

    /// Re-arm the document-wide compliance flag.
    pub fn reset_pdfa(&self) {
        self.pdfa.set(true);
    }

    fn note_pdfa(&self, ok: bool) {
        if !ok {
            self.pdfa.set(false);
        }
    }

    /// Dereference an indirect reference; any other object is returned
    /// unchanged without I/O.
    pub fn resolve(&self, obj: &PdfObject) -> Result<Rc<PdfObject>> {
        match obj {
            PdfObject::Ref(r) => self.get_object(r.num),
            other => Ok(Rc::new(other.clone())),
        }
    }

    /// Materialize the object with the given number, through the cache.
    ///
    /// Resolution that re-enters itself (an object stream containing
    /// its own container, for instance) is reported as a recursion
    /// guard trip instead of looping.
    pub fn get_object(&self, num: u32) -> Result<Rc<PdfObject>> {
        if num == 0 {
            return Err(ValidationError::ObjectNotFound(0));
        }

        if !self.resolving.borrow_mut().insert(num) {
            return Err(ValidationError::RecursionGuard(format!(
                "object {num} is already being resolved"
            )));
        }
        let _guard = ResolveGuard {
            set: &self.resolving,
            num,
        };

        if let Some(hit) = self.cache.borrow_mut().get(num) {
            return Ok(hit);
        }

        let entry = *self
            .map
            .get(num)
            .ok_or(ValidationError::ObjectNotFound(num))?;
        let obj = match entry.loc {
            Location::Offset(offset) => self.parse_at_offset(num, offset)?,
            Location::InStream { container, index } => {
                self.parse_from_object_stream(container, index)?
            }
        };

        let obj = Rc::new(obj);
        self.cache.borrow_mut().insert(num, Rc::clone(&obj));
        Ok(obj)
    }

    /// Parse the `N G obj` unit at a file offset recorded in the map.
    fn parse_at_offset(&self, num: u32, offset: usize) -> Result<PdfObject> {
        if offset >= self.data.len() {
            return Err(ValidationError::Structural {
                offset,
                msg: format!("object {num} offset beyond end of file"),
            });
        }
        let mut parser = ObjectParser::new(&self.data);
        parser.seek(offset);
        let def = parser.parse_object_def()?;
        self.note_pdfa(parser.pdfa_ok());
        if def.num != num {
            return Err(ValidationError::Structural {
                offset,
                msg: format!("object number mismatch: expected {num}, found {}", def.num),
            });
        }
        Ok(def.value)
    }

    /// Extract one object from a compressed object stream: decode the
    /// container, read the `/N` pairs of `(number, offset)` headers,
    /// and parse at `/First` plus the indexed offset.
    fn parse_from_object_stream(&self, container: u32, index: usize) -> Result<PdfObject> {
        let container_obj = self.get_object(container)?;
        let stream = container_obj.as_stream()?;
        let decoded = self.decode_stream(stream)?;

        let n = self
            .resolve(stream.get("N").unwrap_or(&PdfObject::Null))?
            .as_int()? as usize;
        let first = self
            .resolve(stream.get("First").unwrap_or(&PdfObject::Null))?
            .as_int()? as usize;

        let mut parser = ObjectParser::new(&decoded);
        let mut pairs = Vec::with_capacity(n);
        for _ in 0..n {
            let num = parser.parse_object()?.as_int()?;
            let rel = parser.parse_object()?.as_int()?;
            pairs.push((num, rel));
        }

        let &(_, rel) = pairs
            .get(index)
            .ok_or_else(|| ValidationError::Structural {
                offset: 0,
                msg: format!("object stream {container} has no entry at index {index}"),
            })?;

        parser.seek(first + rel as usize);
        let obj = parser.parse_object()?;
        self.note_pdfa(parser.pdfa_ok());
        Ok(obj)
    }

    /// Snapshot the raw (still encoded) bytes of a stream. The bytes
    /// are buffered once; further reads never touch the file region
    /// again.
    pub fn raw_stream_bytes(&self, stream: &StreamObject) -> Result<Bytes> {
        let end = stream
            .data_offset
            .checked_add(stream.scanned_length)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| ValidationError::Structural {
                offset: stream.data_offset,
                msg: "stream data out of range".to_string(),
            })?;
        Ok(self.data.slice(stream.data_offset..end))
    }

    /// The stream's ordered filter list, with indirect filter names
    /// and parameter dictionaries resolved.
    pub fn stream_filters(&self, stream: &StreamObject) -> Result<Vec<FilterSpec>> {
        filter::specs_from_dict(&stream.dict, &|obj| {
            self.resolve(obj).map(|rc| (*rc).clone())
        })
    }

    /// Layer the stream's filter chain over its buffered raw bytes,
    /// yielding a decoded-byte reader.
    pub fn stream_reader(&self, stream: &StreamObject) -> Result<StreamReader> {
        let raw = self.raw_stream_bytes(stream)?;
        let specs = self.stream_filters(stream)?;
        filter::chain(raw, &specs)
    }

    /// Decode a stream's full content eagerly.
    pub fn decode_stream(&self, stream: &StreamObject) -> Result<Vec<u8>> {
        let raw = self.raw_stream_bytes(stream)?;
        let specs = self.stream_filters(stream)?;
        filter::decode_all(&raw, &specs)
    }

    /// Compare the declared /Length against the scanned data length.
    ///
    /// A mismatch leaves the document well-formed but not valid; it is
    /// reported without blocking decoding, which always uses the
    /// scanned length.
    pub fn check_stream_length(&self, stream: &StreamObject) -> Result<()> {
        if let Some(len_obj) = stream.dict.get("Length") {
            let declared = self.resolve(len_obj)?.as_int()?;
            if declared < 0 || declared as usize != stream.scanned_length {
                return Err(ValidationError::SemanticInvalid(format!(
                    "stream /Length {declared} does not match scanned length {}",
                    stream.scanned_length
                )));
            }
        }
        Ok(())
    }
}
