//! Definition-file tokenizer implementation.

use super::token::KEYWORDS;
use super::{Span, Token, TokenKind};
use crate::parser::ParseError;

/// A lexer that tokenizes definition text.
///
/// Scanning is byte-oriented; spans index into the original text and
/// no characters are copied.
pub struct Lexer<'a> {
    /// The input bytes.
    src: &'a [u8],
    /// The current byte position.
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.src[self.pos..]
    }

    /// Scans the next token.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] on an unterminated string or block
    /// comment.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        while self.pos < self.src.len() {
            let rest = self.rest();

            // `/*! ... */` is a doc block; a plain `/* ... */` is
            // skipped like whitespace.
            if rest.starts_with(b"/*!") {
                return self.scan_doxygen();
            }
            if rest.starts_with(b"/*") {
                let open = self.pos;
                self.pos += 2;
                self.skip_comment_block(open)?;
                continue;
            }
            if rest.starts_with(b"//") {
                self.pos += 2;
                while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            let byte = rest[0];
            if byte.is_ascii_whitespace() {
                self.pos += 1;
                continue;
            }
            if byte == b'"' {
                return self.scan_string();
            }

            // Directive and bareword keywords match by byte prefix,
            // ahead of general label scanning.
            for (keyword, kind) in KEYWORDS {
                if rest.starts_with(keyword.as_bytes()) {
                    let span = Span::new(self.pos, self.pos + keyword.len());
                    self.pos = span.end;
                    return Ok(Token::new(*kind, span));
                }
            }

            if byte.is_ascii_alphabetic() || byte == b'_' {
                return Ok(self.scan_label());
            }
            if byte.is_ascii_digit() {
                return Ok(self.scan_integer());
            }

            let span = Span::new(self.pos, self.pos + 1);
            self.pos += 1;
            return Ok(Token::new(TokenKind::Punct(byte), span));
        }

        Ok(Token::new(TokenKind::End, Span::new(self.pos, self.pos)))
    }

    /// Scans a brace-delimited block and returns its body span with
    /// leading and trailing whitespace trimmed.
    ///
    /// When `expect_opening_brace` is set the next token must be `{`;
    /// otherwise the brace is assumed to have just been consumed.
    /// Nested braces are tracked by depth; comments and strings inside
    /// the block are not interpreted.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the opening brace is missing or the
    /// block is unterminated.
    pub fn block(&mut self, expect_opening_brace: bool) -> Result<Span, ParseError> {
        if expect_opening_brace {
            let tok = self.next_token()?;
            if !tok.is_punct(b'{') {
                return Err(ParseError::new("expected \"{\"", tok.span));
            }
        }

        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }

        let start = self.pos;
        let mut depth = 1usize;
        while self.pos < self.src.len() {
            match self.src[self.pos] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let mut end = self.pos;
                        self.pos += 1;
                        while end > start && self.src[end - 1].is_ascii_whitespace() {
                            end -= 1;
                        }
                        return Ok(Span::new(start, end));
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        Err(ParseError::new(
            "missing closing \"}\"",
            Span::new(start, self.src.len()),
        ))
    }

    /// Skips to the end of a `/* ... */` comment.
    fn skip_comment_block(&mut self, open: usize) -> Result<(), ParseError> {
        while self.pos + 1 < self.src.len() {
            if self.src[self.pos] == b'*' && self.src[self.pos + 1] == b'/' {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        self.pos = self.src.len();
        Err(ParseError::new(
            "missing \"*/\" closing block comment",
            Span::new(open, self.src.len()),
        ))
    }

    /// Scans a `/*! ... */` doc block.
    ///
    /// The span rewinds over leading blanks on the current line so the
    /// block's indentation survives re-emission.
    fn scan_doxygen(&mut self) -> Result<Token, ParseError> {
        let mut start = self.pos;
        while start > 0 && matches!(self.src[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        let open = self.pos;
        self.pos += 3;
        self.skip_comment_block(open)?;
        Ok(Token::new(TokenKind::Doxygen, Span::new(start, self.pos)))
    }

    /// Scans a `"..."` literal; the span excludes the quotes.
    fn scan_string(&mut self) -> Result<Token, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'"' {
                let span = Span::new(start, self.pos);
                self.pos += 1;
                return Ok(Token::new(TokenKind::Str, span));
            }
            self.pos += 1;
        }
        Err(ParseError::new(
            "missing closing quote on string",
            Span::new(open, self.src.len()),
        ))
    }

    fn scan_label(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.src.len()
            && matches!(self.src[self.pos], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'*')
        {
            self.pos += 1;
        }
        Token::new(TokenKind::Label, Span::new(start, self.pos))
    }

    fn scan_integer(&mut self) -> Token {
        let start = self.pos;
        let mut value: i64 = 0;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            value = (value * 10 + i64::from(self.src[self.pos] - b'0')).min(i64::from(i32::MAX));
            self.pos += 1;
        }
        Token::new(
            TokenKind::Integer(value as i32),
            Span::new(start, self.pos),
        )
    }
}
