//! Error types for fafner PDF validation.

use thiserror::Error;

/// Primary error type for PDF well-formedness and validity checking.
///
/// The variants separate failures that make a document not well-formed
/// (`Lexical`, `Structural`) from failures that leave it well-formed but
/// invalid (`SemanticInvalid`), from failures scoped to a single stream's
/// content (`FilterDecode`), and from guard trips on malformed object
/// graphs (`RecursionGuard`). `Io` is always fatal to the current parse.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("lexical error at offset {offset}: {msg}")]
    Lexical { offset: usize, msg: String },

    #[error("structural error at offset {offset}: {msg}")]
    Structural { offset: usize, msg: String },

    #[error("invalid value: {0}")]
    SemanticInvalid(String),

    #[error("recursion guard: {0}")]
    RecursionGuard(String),

    #[error("filter {filter}: {msg}")]
    FilterDecode { filter: String, msg: String },

    #[error("type error: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("object {0} not found")]
    ObjectNotFound(u32),

    #[error("no usable cross-reference table")]
    NoXref,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidationError {
    /// Whether the error degrades the report without aborting the
    /// document scan (semantic invalidity, one stream's decode failure).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SemanticInvalid(_) | Self::FilterDecode { .. } | Self::TypeMismatch { .. }
        )
    }
}

/// Convenience Result type alias for ValidationError.
pub type Result<T> = std::result::Result<T, ValidationError>;
