use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::mem;

/// The different kinds of tokens recognized by the scanner.
///
/// Variants without data represent punctuation, operators and keywords.
/// `INTEGER(i64)`, `NUMBER(f64)` and `STRING(String)` carry their literal
/// values. `IDENTIFIER` is used for user‑defined names.
/// `EOF` marks the end of input.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// '('
    LEFT_PAREN,

    /// ')'
    RIGHT_PAREN,

    /// ','
    COMMA,

    /// ':'
    COLON,

    /// '#'
    HASH,

    /// '*'
    STAR,

    /// '/'
    SLASH,

    /// '//'
    SLASH_SLASH,

    /// '+'
    PLUS,

    /// '-'
    MINUS,

    /// '..'
    DOT_DOT,

    /// '='
    EQUAL,

    /// '=='
    EQUAL_EQUAL,

    /// '~='
    TILDE_EQUAL,

    /// '<'
    LESS,

    /// '<='
    LESS_EQUAL,

    /// '>'
    GREATER,

    /// '>='
    GREATER_EQUAL,

    /// A user‑defined identifier
    IDENTIFIER,

    /// An integer literal
    #[serde(rename = "INTEGER")]
    INTEGER(i64),

    /// A decimal literal
    #[serde(rename = "NUMBER")]
    NUMBER(f64),

    /// A string literal (escapes already decoded)
    STRING(String),

    /// 'do'
    DO,

    /// 'else'
    ELSE,

    /// 'end'
    END,

    /// 'function'
    FUNCTION,

    /// 'global'
    GLOBAL,

    /// 'if'
    IF,

    /// 'local'
    LOCAL,

    /// 'nil'
    NIL,

    /// 'require'
    REQUIRE,

    /// 'return'
    RETURN,

    /// 'then'
    THEN,

    /// 'while'
    WHILE,

    /// 'integer'
    TYPE_INTEGER,

    /// 'number'
    TYPE_NUMBER,

    /// 'string'
    TYPE_STRING,

    /// End‑of‑file marker
    EOF,
}

impl PartialEq for TokenType {
    /// Two TokenTypes are equal if they share the same variant
    /// (ignoring any inner data). Uses `mem::discriminant` to compare.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl TokenType {
    /// Variant name without payload, as printed by `tokenize`.
    pub fn name(&self) -> &'static str {
        match self {
            TokenType::LEFT_PAREN => "LEFT_PAREN",
            TokenType::RIGHT_PAREN => "RIGHT_PAREN",
            TokenType::COMMA => "COMMA",
            TokenType::COLON => "COLON",
            TokenType::HASH => "HASH",
            TokenType::STAR => "STAR",
            TokenType::SLASH => "SLASH",
            TokenType::SLASH_SLASH => "SLASH_SLASH",
            TokenType::PLUS => "PLUS",
            TokenType::MINUS => "MINUS",
            TokenType::DOT_DOT => "DOT_DOT",
            TokenType::EQUAL => "EQUAL",
            TokenType::EQUAL_EQUAL => "EQUAL_EQUAL",
            TokenType::TILDE_EQUAL => "TILDE_EQUAL",
            TokenType::LESS => "LESS",
            TokenType::LESS_EQUAL => "LESS_EQUAL",
            TokenType::GREATER => "GREATER",
            TokenType::GREATER_EQUAL => "GREATER_EQUAL",
            TokenType::IDENTIFIER => "IDENTIFIER",
            TokenType::INTEGER(_) => "INTEGER",
            TokenType::NUMBER(_) => "NUMBER",
            TokenType::STRING(_) => "STRING",
            TokenType::DO => "DO",
            TokenType::ELSE => "ELSE",
            TokenType::END => "END",
            TokenType::FUNCTION => "FUNCTION",
            TokenType::GLOBAL => "GLOBAL",
            TokenType::IF => "IF",
            TokenType::LOCAL => "LOCAL",
            TokenType::NIL => "NIL",
            TokenType::REQUIRE => "REQUIRE",
            TokenType::RETURN => "RETURN",
            TokenType::THEN => "THEN",
            TokenType::WHILE => "WHILE",
            TokenType::TYPE_INTEGER => "TYPE_INTEGER",
            TokenType::TYPE_NUMBER => "TYPE_NUMBER",
            TokenType::TYPE_STRING => "TYPE_STRING",
            TokenType::EOF => "EOF",
        }
    }
}

/// A scanned token, including its type, the original lexeme,
/// and the line number where it was found.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token<'a> {
    /// The category of this token.
    pub token_type: TokenType,

    /// The exact substring from the source that produced this token.
    pub lexeme: &'a str,

    /// 1‑based line number in the source.
    pub line: usize,
}

impl<'a> Token<'a> {
    /// Create a new Token with the given type, lexeme, and line.
    pub fn new(token_type: TokenType, lexeme: &'a str, line: usize) -> Self {
        debug!(
            "Creating new token: type={:?}, lexeme={}, line={}",
            token_type, lexeme, line
        );

        Self {
            token_type,
            lexeme,
            line,
        }
    }

    #[inline]
    pub fn is(&self, ttype: TokenType) -> bool {
        self.token_type == ttype
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ── 1. literal column ─────────────────────────────────────────────
        let literal: String = match &self.token_type {
            TokenType::STRING(s) => s.clone(),
            TokenType::INTEGER(n) => {
                let mut buf: itoa::Buffer = itoa::Buffer::new();
                buf.format(*n).to_owned()
            }
            TokenType::NUMBER(n) => {
                // 3 → "3.0", 3.14 → "3.14"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    let mut buf: itoa::Buffer = itoa::Buffer::new();
                    format!("{}.0", buf.format(*n as i64))
                } else {
                    n.to_string()
                }
            }
            _ => "null".to_owned(),
        };

        // ── 2. variant name without payloads ───────────────────────────────
        let variant: &'static str = self.token_type.name();

        info!("Formatted token: {} {} {}", variant, self.lexeme, literal);

        write!(f, "{} {} {}", variant, self.lexeme, literal)
    }
}
