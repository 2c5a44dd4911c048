//! Character-level tokenizer for PDF object syntax.
//!
//! One lexical state is live at a time; `next_token` dispatches on the
//! first byte into a method per state (number, name, literal string,
//! hexadecimal string, keyword, comment) and each method runs to the
//! token's terminal condition before returning to the idle state.

use crate::encoding::decode_text;
use crate::error::{Result, ValidationError};
use crate::parser::token::{Keyword, Token, TokenKind};

/// Tokenizer over a random-access byte source.
///
/// Lexing can start at any offset (`set_pos`), which is how
/// cross-reference entries pointing into the middle of the file are
/// followed. Reaching end of input while idle ends the token stream;
/// reaching it mid-token is a lexical error at the current offset.
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    /// When set, literal and hex strings are consumed but not decoded
    /// or emitted. Used for fast structural scans.
    scan_mode: bool,
    /// Running AND of every emitted token's compliance bit.
    pdfa_ok: bool,
    /// Compliance bit of the token currently being lexed.
    tok_pdfa: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            scan_mode: false,
            pdfa_ok: true,
            tok_pdfa: true,
        }
    }

    /// Current position in the byte source.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Reposition and reset to the idle state. Any partially lexed
    /// token state is discarded.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
        self.tok_pdfa = true;
    }

    /// Enable or disable structural scan mode.
    pub fn set_scan_mode(&mut self, scan: bool) {
        self.scan_mode = scan;
    }

    /// Whether every token lexed so far was PDF/A compliant.
    pub fn pdfa_ok(&self) -> bool {
        self.pdfa_ok
    }

    /// Re-arm the running compliance flag.
    pub fn reset_pdfa(&mut self) {
        self.pdfa_ok = true;
    }

    fn is_whitespace(b: u8) -> bool {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
    }

    fn is_delimiter(b: u8) -> bool {
        matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    fn is_token_end(b: u8) -> bool {
        Self::is_whitespace(b) || Self::is_delimiter(b)
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn eof_error(&self, msg: &str) -> ValidationError {
        ValidationError::Lexical {
            offset: self.pos,
            msg: msg.to_string(),
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Option<Result<Token>> {
        self.next_token_impl(None)
    }

    /// Get the next token, bounding string accumulation to `max_bytes`.
    ///
    /// A literal or hex string longer than the bound is returned as a
    /// partially filled string token with the cursor left mid-string;
    /// the caller is expected to reposition before continuing.
    pub fn next_token_bounded(&mut self, max_bytes: usize) -> Option<Result<Token>> {
        self.next_token_impl(Some(max_bytes))
    }

    fn next_token_impl(&mut self, max: Option<usize>) -> Option<Result<Token>> {
        loop {
            while let Some(b) = self.peek() {
                if !Self::is_whitespace(b) {
                    break;
                }
                self.pos += 1;
            }

            let token_pos = self.pos;
            let b = self.peek()?;
            self.tok_pdfa = true;

            let kind = match b {
                b'%' => self.parse_comment(),
                b'/' => self.parse_name(),
                b'(' => {
                    if self.scan_mode {
                        if let Err(e) = self.skip_literal_string() {
                            return Some(Err(e));
                        }
                        continue;
                    }
                    self.parse_literal_string(max)
                }
                b'<' => {
                    if self.peek_at(1) == Some(b'<') {
                        self.pos += 2;
                        Ok(TokenKind::DictStart)
                    } else if self.scan_mode {
                        if let Err(e) = self.skip_hex_string() {
                            return Some(Err(e));
                        }
                        continue;
                    } else {
                        self.parse_hex_string(max)
                    }
                }
                b'>' => {
                    if self.peek_at(1) == Some(b'>') {
                        self.pos += 2;
                        Ok(TokenKind::DictEnd)
                    } else {
                        Err(ValidationError::Lexical {
                            offset: token_pos,
                            msg: "unexpected '>' outside hex string".to_string(),
                        })
                    }
                }
                b'[' => {
                    self.pos += 1;
                    Ok(TokenKind::ArrayStart)
                }
                b']' => {
                    self.pos += 1;
                    Ok(TokenKind::ArrayEnd)
                }
                b')' | b'{' | b'}' => Err(ValidationError::Lexical {
                    offset: token_pos,
                    msg: format!("unexpected delimiter '{}'", b as char),
                }),
                b'+' | b'-' => {
                    if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') {
                        self.parse_number()
                    } else {
                        self.parse_keyword()
                    }
                }
                b'.' => {
                    if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
                        self.parse_number()
                    } else {
                        self.parse_keyword()
                    }
                }
                c if c.is_ascii_digit() => self.parse_number(),
                _ => self.parse_keyword(),
            };

            return Some(kind.map(|kind| {
                let pdfa = self.tok_pdfa;
                self.pdfa_ok &= pdfa;
                Token {
                    kind,
                    pos: token_pos,
                    pdfa,
                }
            }));
        }
    }

    /// `%` comment, runs to end of line (the line ending stays in the
    /// input and is skipped as whitespace before the next token).
    fn parse_comment(&mut self) -> Result<TokenKind> {
        self.pos += 1; // consume '%'
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        let text = self.data[start..self.pos]
            .iter()
            .map(|&b| char::from(b))
            .collect();
        Ok(TokenKind::Comment(text))
    }

    /// `/Name` with `#XX` hex escapes. An invalid escape drops the `#`
    /// and keeps the following characters.
    fn parse_name(&mut self) -> Result<TokenKind> {
        self.pos += 1; // consume '/'
        let mut name = Vec::with_capacity(16);

        while let Some(b) = self.peek() {
            if Self::is_token_end(b) {
                break;
            }
            if b == b'#' {
                if let (Some(c1), Some(c2)) = (self.peek_at(1), self.peek_at(2))
                    && let (Some(h1), Some(h2)) = (hex_value(c1), hex_value(c2))
                {
                    name.push((h1 << 4) | h2);
                    self.pos += 3;
                    continue;
                }
                self.pos += 1;
                continue;
            }
            name.push(b);
            self.pos += 1;
        }

        Ok(TokenKind::Name(
            name.iter().map(|&b| char::from(b)).collect(),
        ))
    }

    /// Integer or real: optional sign, digits, at most one decimal
    /// point. A second dot terminates the number.
    fn parse_number(&mut self) -> Result<TokenKind> {
        let start = self.pos;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }

        let mut has_dot = false;
        if self.peek() == Some(b'.') {
            has_dot = true;
            self.pos += 1;
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !has_dot {
                has_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        let text =
            std::str::from_utf8(&self.data[start..self.pos]).map_err(|_| ValidationError::Lexical {
                offset: start,
                msg: "invalid number".to_string(),
            })?;

        if has_dot {
            let value: f64 = text.parse().map_err(|_| ValidationError::Lexical {
                offset: start,
                msg: format!("invalid real: {text}"),
            })?;
            Ok(TokenKind::Real(value))
        } else {
            let value: i64 = text.parse().map_err(|_| ValidationError::Lexical {
                offset: start,
                msg: format!("invalid int: {text}"),
            })?;
            Ok(TokenKind::Int(value))
        }
    }

    /// Literal `(...)` string: parenthesis nesting, backslash escapes,
    /// then text decoding (UTF-16BE behind a `FE FF` prefix, otherwise
    /// PDFDocEncoding). An octal escape shorter than three digits is
    /// accepted but clears the compliance bit.
    fn parse_literal_string(&mut self, max: Option<usize>) -> Result<TokenKind> {
        let raw = self.collect_literal_bytes(max)?;
        let (text, encoding) = decode_text(&raw);
        Ok(TokenKind::Literal { text, encoding })
    }

    fn collect_literal_bytes(&mut self, max: Option<usize>) -> Result<Vec<u8>> {
        self.pos += 1; // consume '('
        let mut depth = 1usize;
        let mut out = Vec::with_capacity(32);

        loop {
            if let Some(limit) = max
                && out.len() >= limit
            {
                return Ok(out);
            }
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.eof_error("end of input inside literal string")),
            };
            self.pos += 1;
            match c {
                b'(' => {
                    depth += 1;
                    out.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b')');
                }
                b'\\' => {
                    let esc = match self.peek() {
                        Some(e) => e,
                        None => return Err(self.eof_error("end of input inside literal string")),
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'(' => out.push(b'('),
                        b')' => out.push(b')'),
                        b'\\' => out.push(b'\\'),
                        b'\r' => {
                            // line continuation, swallow optional LF
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        c if (b'0'..b'8').contains(&c) => {
                            let mut value = (c - b'0') as u32;
                            let mut digits = 1;
                            while digits < 3 {
                                match self.peek() {
                                    Some(d) if (b'0'..b'8').contains(&d) => {
                                        value = value * 8 + (d - b'0') as u32;
                                        digits += 1;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            if digits < 3 {
                                self.tok_pdfa = false;
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        // any other escaped character is dropped
                        _ => {}
                    }
                }
                c => out.push(c),
            }
        }
    }

    /// Consume a literal string without building its value (scan mode).
    fn skip_literal_string(&mut self) -> Result<()> {
        self.pos += 1; // consume '('
        let mut depth = 1usize;
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.eof_error("end of input inside literal string")),
            };
            self.pos += 1;
            match c {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'\\' => {
                    if self.peek().is_none() {
                        return Err(self.eof_error("end of input inside literal string"));
                    }
                    self.pos += 1;
                }
                _ => {}
            }
        }
    }

    /// Hex `<...>` string: pairs of hex digits, whitespace ignored, a
    /// dangling final digit padded with zero. A non-hex byte before the
    /// closing `>` is a lexical error.
    fn parse_hex_string(&mut self, max: Option<usize>) -> Result<TokenKind> {
        self.pos += 1; // consume '<'
        let mut raw = Vec::with_capacity(32);
        let mut pending: Option<u8> = None;

        loop {
            if let Some(limit) = max
                && raw.len() >= limit
            {
                break;
            }
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.eof_error("end of input inside hex string")),
            };
            if c == b'>' {
                self.pos += 1;
                break;
            }
            if Self::is_whitespace(c) {
                self.pos += 1;
                continue;
            }
            match hex_value(c) {
                Some(nibble) => {
                    self.pos += 1;
                    if let Some(high) = pending.take() {
                        raw.push((high << 4) | nibble);
                    } else {
                        pending = Some(nibble);
                    }
                }
                None => {
                    return Err(ValidationError::Lexical {
                        offset: self.pos,
                        msg: format!("bad hex digit '{}'", c as char),
                    });
                }
            }
        }

        if let Some(high) = pending {
            raw.push(high << 4);
        }

        let (text, encoding) = decode_text(&raw);
        Ok(TokenKind::Literal { text, encoding })
    }

    /// Consume a hex string without building its value (scan mode).
    fn skip_hex_string(&mut self) -> Result<()> {
        self.pos += 1; // consume '<'
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
                None => return Err(self.eof_error("end of input inside hex string")),
            }
        }
    }

    /// Bare keyword, accumulated to the next delimiter or whitespace.
    /// The keyword `stream` hands off to the raw stream-data scanner.
    fn parse_keyword(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if Self::is_token_end(b) {
                break;
            }
            self.pos += 1;
        }
        let keyword = Keyword::from_bytes(&self.data[start..self.pos]);
        if keyword == Keyword::Stream {
            return self.scan_stream_data();
        }
        Ok(TokenKind::Keyword(keyword))
    }

    /// After the `stream` keyword: consume the end-of-line sequence,
    /// then scan raw bytes for the terminating `endstream` keyword,
    /// counting consumed bytes. The end-of-line immediately before
    /// `endstream` is not counted in the stream length.
    ///
    /// A bare CR after `stream` is accepted but clears the compliance
    /// bit (the archival profile requires CRLF or LF there).
    fn scan_stream_data(&mut self) -> Result<TokenKind> {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                } else {
                    self.tok_pdfa = false;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }

        let data_offset = self.pos;
        let needle = b"endstream";
        let mut i = data_offset;
        let found = loop {
            if i >= self.data.len() {
                self.pos = self.data.len();
                return Err(self.eof_error("end of input inside stream data"));
            }
            if self.data[i] == b'e' && self.data[i..].starts_with(needle) {
                break i;
            }
            i += 1;
        };

        let mut length = found - data_offset;
        if length >= 2 && &self.data[found - 2..found] == b"\r\n" {
            length -= 2;
        } else if length >= 1 && matches!(self.data[found - 1], b'\n' | b'\r') {
            length -= 1;
        }

        self.pos = found + needle.len();
        Ok(TokenKind::Stream {
            data_offset,
            length,
        })
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
