//! PDF data model types.
//!
//! - `object` - the PDF object sum type and its companions

pub mod object;

// Re-export main types for convenience
pub use object::{Dict, IndirectObject, ObjRef, PdfObject, StreamObject};
