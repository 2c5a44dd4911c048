//! PDF object types.
//!
//! The fundamental value type is the `PdfObject` sum; exhaustive
//! matching over it replaces the open class hierarchies other readers
//! use, so a new variant cannot be silently unhandled.

use crate::encoding::StringEncoding;
use crate::error::{Result, ValidationError};
use std::collections::HashMap;

/// Dictionary payload: name keys to object values, keys unique,
/// insertion order irrelevant.
pub type Dict = HashMap<String, PdfObject>;

/// PDF object value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g. /Type, /Kids)
    Name(String),
    /// Text string with its detected encoding
    String {
        text: String,
        encoding: StringEncoding,
    },
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(Dict),
    /// Stream (dictionary + located raw data)
    Stream(Box<StreamObject>),
    /// Indirect object reference (`N G R`)
    Ref(ObjRef),
}

impl PdfObject {
    /// Check if this is a null object.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean.
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    /// Get as integer.
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Get numeric value (int or real coerced to f64).
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    /// Get as name string.
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    /// Get as decoded text string.
    pub fn as_string(&self) -> Result<&str> {
        match self {
            Self::String { text, .. } => Ok(text),
            _ => Err(self.type_error("string")),
        }
    }

    /// Get as array.
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Get as dictionary. A stream answers with its attribute dict.
    pub fn as_dict(&self) -> Result<&Dict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(self.type_error("dict")),
        }
    }

    /// Get as stream.
    pub fn as_stream(&self) -> Result<&StreamObject> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    /// Get as object reference.
    pub const fn as_obj_ref(&self) -> Result<ObjRef> {
        match self {
            Self::Ref(r) => Ok(*r),
            _ => Err(self.type_error("ref")),
        }
    }

    const fn type_error(&self, expected: &'static str) -> ValidationError {
        ValidationError::TypeMismatch {
            expected,
            got: self.type_name(),
        }
    }

    /// Get type name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String { .. } => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// Persistent identity of an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    /// Object number
    pub num: u32,
    /// Generation number
    pub r#gen: u16,
}

impl ObjRef {
    pub const fn new(num: u32, r#gen: u16) -> Self {
        Self { num, r#gen }
    }
}

/// Stream object: attribute dictionary plus the location of the raw
/// (still encoded) data within the document's byte source.
///
/// The raw bytes themselves live in the document buffer; reading
/// decoded content goes through the document's filter pipeline so the
/// snapshot is taken exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamObject {
    /// Stream dictionary attributes
    pub dict: Dict,
    /// Byte offset of the first data byte after the `stream` keyword
    pub data_offset: usize,
    /// Data length found by the `endstream` scan (end-of-line before
    /// `endstream` excluded); may disagree with the declared /Length
    pub scanned_length: usize,
    /// Object identity, when read as a top-level object definition
    pub id: Option<ObjRef>,
}

impl StreamObject {
    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&PdfObject> {
        self.dict.get(name)
    }

    /// Declared /Length attribute, when present and direct.
    pub fn declared_length(&self) -> Option<i64> {
        self.dict.get("Length").and_then(|obj| obj.as_int().ok())
    }
}

/// A top-level `N G obj ... endobj` unit with its stamped identity.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub num: u32,
    pub r#gen: u16,
    pub value: PdfObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        assert_eq!(PdfObject::Int(7).as_int().unwrap(), 7);
        assert_eq!(PdfObject::Int(7).as_num().unwrap(), 7.0);
        assert_eq!(PdfObject::Real(0.5).as_num().unwrap(), 0.5);
        assert!(PdfObject::Null.is_null());
        let err = PdfObject::Null.as_int().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch {
                expected: "int",
                got: "null"
            }
        ));
    }

    #[test]
    fn stream_answers_as_dict() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), PdfObject::Int(5));
        let stream = PdfObject::Stream(Box::new(StreamObject {
            dict,
            data_offset: 0,
            scanned_length: 5,
            id: None,
        }));
        assert_eq!(
            stream.as_dict().unwrap().get("Length"),
            Some(&PdfObject::Int(5))
        );
        assert_eq!(stream.as_stream().unwrap().declared_length(), Some(5));
    }
}
