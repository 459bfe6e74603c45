//! Token types for the Markut DSL lexer.

use std::fmt;
use std::sync::Arc;

use super::timestamp::Millis;

/// A position in a source file. Row and column are 0-based internally and
/// printed 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Loc {
    pub file_path: Arc<str>,
    pub row: usize,
    pub col: usize,
}

impl Loc {
    pub fn new(file_path: impl Into<Arc<str>>, row: usize, col: usize) -> Self {
        Self {
            file_path: file_path.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.row + 1, self.col + 1)
    }
}

/// The kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Symbol,
    String,
    BracketOpen,
    BracketClose,
    CurlyOpen,
    CurlyClose,
    ParenOpen,
    ParenClose,
    Ellipsis,
    Asterisk,
    Timestamp,
    Dash,
    Plus,
}

impl TokenKind {
    /// Human-readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of file",
            TokenKind::Symbol => "symbol",
            TokenKind::String => "string literal",
            TokenKind::BracketOpen => "open bracket",
            TokenKind::BracketClose => "close bracket",
            TokenKind::CurlyOpen => "open curly",
            TokenKind::CurlyClose => "close curly",
            TokenKind::ParenOpen => "open paren",
            TokenKind::ParenClose => "close paren",
            TokenKind::Ellipsis => "ellipsis",
            TokenKind::Asterisk => "asterisk",
            TokenKind::Timestamp => "timestamp",
            TokenKind::Dash => "dash",
            TokenKind::Plus => "plus",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed punctuation, matched by longest prefix.
pub const LITERAL_TOKENS: &[(&str, TokenKind)] = &[
    ("...", TokenKind::Ellipsis),
    ("[", TokenKind::BracketOpen),
    ("]", TokenKind::BracketClose),
    ("{", TokenKind::CurlyOpen),
    ("}", TokenKind::CurlyClose),
    ("(", TokenKind::ParenOpen),
    (")", TokenKind::ParenClose),
    ("*", TokenKind::Asterisk),
    ("-", TokenKind::Dash),
    ("+", TokenKind::Plus),
];

/// A token produced by the lexer, or synthesized by the evaluator as the
/// result of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text for symbols and punctuation, the unescaped contents for strings.
    pub text: String,
    /// Parsed value, only meaningful for [`TokenKind::Timestamp`].
    pub timestamp: Millis,
    pub loc: Loc,
}

impl Token {
    pub fn eof(loc: Loc) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            timestamp: 0,
            loc,
        }
    }

    /// A computed timestamp, stamped with the location of the operation that produced it.
    pub fn timestamp(value: Millis, loc: Loc) -> Self {
        Self {
            kind: TokenKind::Timestamp,
            text: String::new(),
            timestamp: value,
            loc,
        }
    }

    /// A computed string, stamped with the location of the operation that produced it.
    pub fn string(text: impl Into<String>, loc: Loc) -> Self {
        Self {
            kind: TokenKind::String,
            text: text.into(),
            timestamp: 0,
            loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_displays_one_based() {
        let loc = Loc::new("stream.markut", 0, 4);
        assert_eq!(loc.to_string(), "stream.markut:1:5");
    }

    #[test]
    fn ellipsis_is_tried_before_shorter_literals() {
        assert_eq!(LITERAL_TOKENS[0], ("...", TokenKind::Ellipsis));
    }

    #[test]
    fn kind_names() {
        assert_eq!(TokenKind::Timestamp.to_string(), "timestamp");
        assert_eq!(TokenKind::String.to_string(), "string literal");
    }
}
