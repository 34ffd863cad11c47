//! Module `scanner` implements a one‑pass, streaming lexer for the source
//! language.
//!
//! It transforms a byte slice (`&[u8]`) into a sequence of `Token<'a>`s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a `FusedIterator`,
//! it is consumed through [`crate::cursor::TokenCursor`], which adds the one-token pushback the
//! parser needs.
//!
//! # Token Recognition (`scan_token`)
//!
//! - Single‑character tokens: `(`, `)`, `,`, `:`, `#`, `*`, `+`.
//! - Two‑character operators: `//`, `..`, `==`, `~=`, `<=`, `>=`.
//! - String literals: `"` … `"` on one line, with `\"`, `\\`, `\n`, `\t` and `\ddd` escapes.
//! - Numeric literals: integers, and decimals with optional fraction and exponent.
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect‑hash `KEYWORDS` map.
//! - Comments: `--` to end of line, `--[[ … ]]` blocks (may span lines).
//! - Errors: any unexpected byte yields `CompileError::lex(line, message)`.
//!
//! Comment skipping uses `memchr`/`memmem` for bulk search; lexemes borrow the
//! original buffer.

use crate::error::{CompileError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::{memchr, memchr_iter, memmem};
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"do"       => TokenType::DO,
    b"else"     => TokenType::ELSE,
    b"end"      => TokenType::END,
    b"function" => TokenType::FUNCTION,
    b"global"   => TokenType::GLOBAL,
    b"if"       => TokenType::IF,
    b"integer"  => TokenType::TYPE_INTEGER,
    b"local"    => TokenType::LOCAL,
    b"nil"      => TokenType::NIL,
    b"number"   => TokenType::TYPE_NUMBER,
    b"require"  => TokenType::REQUIRE,
    b"return"   => TokenType::RETURN,
    b"string"   => TokenType::TYPE_STRING,
    b"then"     => TokenType::THEN,
    b"while"    => TokenType::WHILE,
};

/// A single pass **scanner / lexer** that converts raw UTF‑8 bytes into a
/// sequence of [`Token`]s.  The lifetime `'a` ties every emitted token’s
/// `lexeme` slice back to the original source buffer.
pub struct Scanner<'a> {
    src: &'a [u8],              // entire source file
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    const fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn lexeme(&self) -> Result<&'a str> {
        let slice: &'a [u8] = &self.src[self.start..self.curr];

        std::str::from_utf8(slice).map_err(|_| CompileError::lex(self.line, "Invalid UTF-8"))
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`.  If the lexeme produces an
    /// actual token the kind is stored in `self.pending`.  Whitespace and
    /// comments are skipped by returning `Ok(())` with `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            // ── single‑character punctuators ──────────────────────────────
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b',' => self.pending = Some(TokenType::COMMA),
            b':' => self.pending = Some(TokenType::COLON),
            b'#' => self.pending = Some(TokenType::HASH),
            b'*' => self.pending = Some(TokenType::STAR),
            b'+' => self.pending = Some(TokenType::PLUS),

            // ── two‑character operators ──────────────────────────────────
            b'/' => {
                let tt = if self.match_byte(b'/') {
                    TokenType::SLASH_SLASH
                } else {
                    TokenType::SLASH
                };

                self.pending = Some(tt);
            }

            b'.' => {
                if !self.match_byte(b'.') {
                    return Err(CompileError::lex(self.line, "Expected '..'"));
                }

                self.pending = Some(TokenType::DOT_DOT);
            }

            b'=' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };

                self.pending = Some(tt);
            }

            b'~' => {
                if !self.match_byte(b'=') {
                    return Err(CompileError::lex(self.line, "Expected '~='"));
                }

                self.pending = Some(TokenType::TILDE_EQUAL);
            }

            b'<' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };

                self.pending = Some(tt);
            }

            b'>' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };

                self.pending = Some(tt);
            }

            // ── minus or comment ─────────────────────────────────────────
            b'-' => {
                if self.match_byte(b'-') {
                    return self.skip_comment();
                }

                self.pending = Some(TokenType::MINUS);
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => {
                return Ok(());
            }

            b'\n' => {
                self.line += 1;

                return Ok(());
            }

            b'"' => {
                return self.parse_string();
            }

            b'0'..=b'9' => {
                return self.parse_number();
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            _ => {
                return Err(CompileError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        }

        Ok(())
    }

    /// Skip a comment whose leading `--` was already consumed.
    fn skip_comment(&mut self) -> Result<()> {
        if self.peek() == b'[' && self.peek_next() == b'[' {
            self.curr += 2;

            let rest: &[u8] = &self.src[self.curr..];
            let Some(pos) = memmem::find(rest, b"]]") else {
                return Err(CompileError::lex(self.line, "Unterminated block comment."));
            };

            self.line += memchr_iter(b'\n', &rest[..pos]).count();
            self.curr += pos + 2;

            return Ok(());
        }

        // Line comment: fast‑forward to the next newline (left for the main
        // loop so the line counter stays in one place).
        if let Some(pos) = memchr(b'\n', &self.src[self.curr..]) {
            self.curr += pos;
        } else {
            self.curr = self.len();
        }

        Ok(())
    }

    /// Parse a double‑quoted string literal and decode its escapes.
    fn parse_string(&mut self) -> Result<()> {
        let mut value: String = String::new();
        let mut run_start: usize = self.curr;

        loop {
            if self.is_at_end() || self.peek() == b'\n' {
                return Err(CompileError::lex(self.line, "Unterminated string."));
            }

            match self.peek() {
                b'"' => break,

                b'\\' => {
                    value.push_str(self.utf8(run_start, self.curr)?);
                    self.advance();
                    value.push(self.parse_escape()?);
                    run_start = self.curr;
                }

                c if c < 32 => {
                    return Err(CompileError::lex(
                        self.line,
                        "Control character in string literal",
                    ));
                }

                _ => {
                    self.advance();
                }
            }
        }

        value.push_str(self.utf8(run_start, self.curr)?);
        self.advance(); // closing quote

        self.pending = Some(TokenType::STRING(value));

        Ok(())
    }

    fn utf8(&self, from: usize, to: usize) -> Result<&'a str> {
        let slice: &'a [u8] = &self.src[from..to];

        std::str::from_utf8(slice).map_err(|_| CompileError::lex(self.line, "Invalid UTF-8"))
    }

    /// Decode one escape sequence; the backslash is already consumed.
    fn parse_escape(&mut self) -> Result<char> {
        if self.is_at_end() {
            return Err(CompileError::lex(self.line, "Unterminated string."));
        }

        match self.advance() {
            b'"' => Ok('"'),
            b'\\' => Ok('\\'),
            b'n' => Ok('\n'),
            b't' => Ok('\t'),
            d @ b'0'..=b'9' => {
                let mut code: u32 = u32::from(d - b'0');

                for _ in 0..2 {
                    let c = self.peek();
                    if !c.is_ascii_digit() {
                        return Err(CompileError::lex(
                            self.line,
                            "Escape sequence needs three digits",
                        ));
                    }
                    self.advance();
                    code = code * 10 + u32::from(c - b'0');
                }

                match code {
                    1..=255 => Ok(char::from(code as u8)),
                    _ => Err(CompileError::lex(
                        self.line,
                        format!("Escape \\{:03} out of range", code),
                    )),
                }
            }
            other => Err(CompileError::lex(
                self.line,
                format!("Invalid escape sequence: \\{}", other as char),
            )),
        }
    }

    /// Parse a numeric literal (`123`, `3.14`, `1e-3`, `2.5E+4`).
    fn parse_number(&mut self) -> Result<()> {
        let mut decimal: bool = false;

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            decimal = true;
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if matches!(self.peek(), b'e' | b'E') {
            decimal = true;
            self.advance();

            if matches!(self.peek(), b'+' | b'-') {
                self.advance();
            }

            if !self.peek().is_ascii_digit() {
                return Err(CompileError::lex(self.line, "Malformed exponent"));
            }

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let s: &str = self.lexeme()?;

        let tt: TokenType = if decimal {
            let n: f64 = s
                .parse::<f64>()
                .map_err(|_| CompileError::lex(self.line, format!("Malformed number: {}", s)))?;
            TokenType::NUMBER(n)
        } else {
            let n: i64 = s
                .parse::<i64>()
                .map_err(|_| CompileError::lex(self.line, format!("Integer out of range: {}", s)))?;
            TokenType::INTEGER(n)
        };

        self.pending = Some(tt);

        Ok(())
    }

    /// Parse an identifier and decide if it is a **keyword** or a generic
    /// `IDENTIFIER` token.
    fn parse_identifier(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.src[self.start..self.curr];

        let tt: TokenType = KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.len() {
            // 1. EOF guard – emit exactly one EOF then terminate.
            if self.curr == self.len() {
                self.curr += 1;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            // 2. Reset per‑token state.
            self.start = self.curr;
            self.pending = None;

            // 3. Attempt to scan a token.
            if let Err(e) = self.scan_token() {
                // Resynchronise past the offending byte so iteration can go on.
                self.curr = self.curr.max(self.start + 1);
                return Some(Err(e));
            }

            // 4. If a real token was recognised, build and return it.
            if let Some(tt) = self.pending.take() {
                let lex: &str = match self.lexeme() {
                    Ok(lex) => lex,
                    Err(e) => return Some(Err(e)),
                };
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lex, self.line)));
            }
        }

        None // already yielded EOF
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
