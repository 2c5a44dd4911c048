//! Object parser - assembles lexical tokens into PDF objects.
//!
//! Arrays and dictionaries are accumulated with explicit loops that
//! check for the closing delimiter directly; errors are reserved for
//! genuine malformations. The postfix indirect-reference grammar
//! (`N G R`) is resolved by a right-to-left collapse over each
//! accumulated element list before dictionary pairing.

use crate::error::{Result, ValidationError};
use crate::model::object::{Dict, IndirectObject, ObjRef, PdfObject, StreamObject};
use crate::parser::lexer::Lexer;
use crate::parser::token::{Keyword, Token, TokenKind};

/// Nesting budget for recursive array/dictionary descent.
const MAX_NESTING_DEPTH: usize = 512;

/// Sentinel installed by `reset_loose` so that close tokens seen while
/// recovering from a corrupted region never drive a counter negative.
const LOOSE_DEPTH: i64 = i64::MAX / 2;

/// Parser over a token stream, tracking array/dictionary balance.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    lookahead: Vec<Token>,
    dict_depth: i64,
    array_depth: i64,
}

/// Accumulated element of an array or dictionary body: either a
/// finished object or a pending `R` keyword awaiting collapse.
enum Element {
    Obj(PdfObject),
    RefMarker { pos: usize },
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
            dict_depth: 0,
            array_depth: 0,
        }
    }

    /// Current position in the byte source.
    pub fn tell(&self) -> usize {
        self.lexer.tell()
    }

    /// Reposition for a parse at a different offset. Lexer state resets;
    /// buffered lookahead is discarded.
    pub fn seek(&mut self, pos: usize) {
        self.lookahead.clear();
        self.lexer.set_pos(pos);
    }

    /// Zero the nesting counters for a fresh top-level parse.
    pub fn reset(&mut self) {
        self.dict_depth = 0;
        self.array_depth = 0;
    }

    /// Suppress nesting-balance errors for a recovery parse over a
    /// region where strict balance cannot be guaranteed.
    pub fn reset_loose(&mut self) {
        self.dict_depth = LOOSE_DEPTH;
        self.array_depth = LOOSE_DEPTH;
    }

    /// Enable or disable the lexer's structural scan mode.
    pub fn set_scan_mode(&mut self, scan: bool) {
        self.lexer.set_scan_mode(scan);
    }

    /// Whether every token seen so far was PDF/A compliant.
    pub fn pdfa_ok(&self) -> bool {
        self.lexer.pdfa_ok()
    }

    /// Get the next non-comment token, maintaining the running
    /// dictionary/array nesting counters.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        loop {
            let tok = match self.lexer.next_token() {
                Some(Ok(tok)) => tok,
                Some(Err(e)) => return Err(e),
                None => return Ok(None),
            };
            match &tok.kind {
                TokenKind::Comment(_) => continue,
                TokenKind::DictStart => self.dict_depth += 1,
                TokenKind::DictEnd => {
                    self.dict_depth -= 1;
                    if self.dict_depth < 0 {
                        return Err(ValidationError::Structural {
                            offset: tok.pos,
                            msg: "improperly nested '>>'".to_string(),
                        });
                    }
                }
                TokenKind::ArrayStart => self.array_depth += 1,
                TokenKind::ArrayEnd => {
                    self.array_depth -= 1;
                    if self.array_depth < 0 {
                        return Err(ValidationError::Structural {
                            offset: tok.pos,
                            msg: "improperly nested ']'".to_string(),
                        });
                    }
                }
                _ => {}
            }
            return Ok(Some(tok));
        }
    }

    /// Push a token back; it will be returned by the next `next_token`
    /// call. Nesting counters are not re-applied on the replay.
    fn push_back(&mut self, tok: Token) {
        self.lookahead.push(tok);
    }

    fn require_token(&mut self) -> Result<Token> {
        self.next_token()?.ok_or_else(|| ValidationError::Structural {
            offset: self.lexer.tell(),
            msg: "unexpected end of input".to_string(),
        })
    }

    /// Parse one object at the current position.
    pub fn parse_object(&mut self) -> Result<PdfObject> {
        let tok = self.require_token()?;
        self.object_from_token(tok, 0)
    }

    fn object_from_token(&mut self, tok: Token, depth: usize) -> Result<PdfObject> {
        match tok.kind {
            TokenKind::Int(n) => Ok(PdfObject::Int(n)),
            TokenKind::Real(n) => Ok(PdfObject::Real(n)),
            TokenKind::Name(name) => Ok(PdfObject::Name(name)),
            TokenKind::Literal { text, encoding } => Ok(PdfObject::String { text, encoding }),
            TokenKind::Keyword(Keyword::True) => Ok(PdfObject::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Ok(PdfObject::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => Ok(PdfObject::Null),
            TokenKind::ArrayStart => self.parse_array(depth + 1),
            TokenKind::DictStart => self.parse_dict(depth + 1),
            _ => Err(ValidationError::Structural {
                offset: tok.pos,
                msg: format!("unexpected {} in object position", tok.describe()),
            }),
        }
    }

    /// Parse array elements until the matching `]`.
    fn parse_array(&mut self, depth: usize) -> Result<PdfObject> {
        let elements = self.collect_until(TokenKind::ArrayEnd, depth)?;
        Ok(PdfObject::Array(collapse_references(elements)?))
    }

    /// Parse dictionary entries until the matching `>>`.
    fn parse_dict(&mut self, depth: usize) -> Result<PdfObject> {
        let close_pos = self.lexer.tell();
        let elements = self.collect_until(TokenKind::DictEnd, depth)?;
        let objects = collapse_references(elements)?;

        if objects.len() % 2 != 0 {
            return Err(ValidationError::Structural {
                offset: close_pos,
                msg: format!("dictionary with odd element count {}", objects.len()),
            });
        }

        let mut dict = Dict::with_capacity(objects.len() / 2);
        let mut iter = objects.into_iter();
        while let Some(key) = iter.next() {
            let value = iter.next().unwrap_or(PdfObject::Null);
            match key {
                PdfObject::Name(name) => {
                    // duplicate keys keep the last occurrence
                    dict.insert(name, value);
                }
                other => {
                    return Err(ValidationError::Structural {
                        offset: close_pos,
                        msg: format!("dictionary key must be a name, got {}", other.type_name()),
                    });
                }
            }
        }
        Ok(PdfObject::Dict(dict))
    }

    /// Accumulate array/dictionary body elements until `close` is seen.
    fn collect_until(&mut self, close: TokenKind, depth: usize) -> Result<Vec<Element>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ValidationError::RecursionGuard(format!(
                "array/dictionary nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        let mut elements = Vec::new();
        loop {
            let tok = self.require_token()?;
            if tok.kind == close {
                return Ok(elements);
            }
            match tok.kind {
                TokenKind::ArrayEnd | TokenKind::DictEnd => {
                    return Err(ValidationError::Structural {
                        offset: tok.pos,
                        msg: format!("mismatched {}", tok.describe()),
                    });
                }
                TokenKind::Keyword(Keyword::R) => {
                    elements.push(Element::RefMarker { pos: tok.pos });
                }
                _ => {
                    let obj = self.object_from_token(tok, depth)?;
                    elements.push(Element::Obj(obj));
                }
            }
        }
    }

    /// Read one `N G obj ... endobj` unit at the current position.
    ///
    /// A dictionary immediately followed by stream data fuses into a
    /// stream object. A trailing `endobj` is consumed when present;
    /// its absence is tolerated so recovery scans can resume anywhere.
    pub fn parse_object_def(&mut self) -> Result<IndirectObject> {
        let num_tok = self.require_token()?;
        let num = match num_tok.kind {
            TokenKind::Int(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            _ => {
                return Err(ValidationError::Structural {
                    offset: num_tok.pos,
                    msg: format!("expected object number, got {}", num_tok.describe()),
                });
            }
        };

        let gen_tok = self.require_token()?;
        let r#gen = match gen_tok.kind {
            TokenKind::Int(n) if (0..=u16::MAX as i64).contains(&n) => n as u16,
            _ => {
                return Err(ValidationError::Structural {
                    offset: gen_tok.pos,
                    msg: format!("expected generation number, got {}", gen_tok.describe()),
                });
            }
        };

        let obj_tok = self.require_token()?;
        if !obj_tok.is_keyword(&Keyword::Obj) {
            return Err(ValidationError::Structural {
                offset: obj_tok.pos,
                msg: format!("expected keyword 'obj', got {}", obj_tok.describe()),
            });
        }

        let mut value = self.parse_object()?;

        // A dictionary followed by raw stream data fuses into a stream.
        if let PdfObject::Dict(_) = value
            && let Some(next) = self.next_token()?
        {
            if let TokenKind::Stream {
                data_offset,
                length,
            } = next.kind
            {
                let PdfObject::Dict(dict) = value else {
                    unreachable!()
                };
                value = PdfObject::Stream(Box::new(StreamObject {
                    dict,
                    data_offset,
                    scanned_length: length,
                    id: Some(ObjRef::new(num, r#gen)),
                }));
            } else {
                self.push_back(next);
            }
        }

        if let Some(next) = self.next_token()? {
            if next.is_keyword(&Keyword::EndObj) {
                // consumed
            } else {
                self.push_back(next);
            }
        }

        Ok(IndirectObject { num, r#gen, value })
    }
}

/// Right-to-left scan replacing each `(Int, Int, R)` triple with a
/// single indirect reference. This postfix grammar is PDF's only
/// context-sensitive construct and must be resolved before a
/// dictionary's flat element list can be paired into entries.
fn collapse_references(mut elements: Vec<Element>) -> Result<Vec<PdfObject>> {
    let mut out = Vec::with_capacity(elements.len());
    while let Some(element) = elements.pop() {
        match element {
            Element::Obj(obj) => out.push(obj),
            Element::RefMarker { pos } => {
                let r#gen = elements.pop();
                let num = elements.pop();
                match (num, r#gen) {
                    (
                        Some(Element::Obj(PdfObject::Int(num))),
                        Some(Element::Obj(PdfObject::Int(r#gen))),
                    ) if (0..=u32::MAX as i64).contains(&num)
                        && (0..=u16::MAX as i64).contains(&r#gen) =>
                    {
                        out.push(PdfObject::Ref(ObjRef::new(num as u32, r#gen as u16)));
                    }
                    _ => {
                        return Err(ValidationError::Structural {
                            offset: pos,
                            msg: "malformed indirect reference triple".to_string(),
                        });
                    }
                }
            }
        }
    }
    out.reverse();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_consumes_exactly_three_elements() {
        let obj = ObjectParser::new(b"[ 1 12 0 R 2 ]").parse_object().unwrap();
        assert_eq!(
            obj,
            PdfObject::Array(vec![
                PdfObject::Int(1),
                PdfObject::Ref(ObjRef::new(12, 0)),
                PdfObject::Int(2),
            ])
        );
    }

    #[test]
    fn bare_r_keyword_is_structural_error() {
        let err = ObjectParser::new(b"[ 1 R ]").parse_object().unwrap_err();
        assert!(matches!(err, ValidationError::Structural { .. }));
    }

    #[test]
    fn consecutive_references_collapse() {
        let obj = ObjectParser::new(b"[ 1 0 R 2 0 R ]").parse_object().unwrap();
        assert_eq!(
            obj,
            PdfObject::Array(vec![
                PdfObject::Ref(ObjRef::new(1, 0)),
                PdfObject::Ref(ObjRef::new(2, 0)),
            ])
        );
    }
}
