//! fafner - PDF well-formedness and validity checking.
//!
//! The crate covers the syntactic core of PDF validation: a
//! character-level tokenizer, an object parser over the token stream,
//! the object graph with cross-reference-driven resolution, and the
//! stream filter pipeline. Profile checkers and report formatting sit
//! on top of these interfaces.

pub mod document;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod model;
pub mod parser;

// Re-export the primary types at the crate root
pub use document::{
    Document, Location, ObjectMap, PageLabelWalker, PageNode, PageTreeWalker, StructNode,
    StructTreeWalker, XrefEntry,
};
pub use encoding::StringEncoding;
pub use error::{Result, ValidationError};
pub use filter::{FilterSpec, StreamReader};
pub use model::{Dict, IndirectObject, ObjRef, PdfObject, StreamObject};
pub use parser::{Keyword, Lexer, ObjectParser, Token, TokenKind};
