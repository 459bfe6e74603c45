//! Lexer for the Markut DSL.
//!
//! Converts source text into a stream of located [`Token`]s, one at a time.

use std::sync::Arc;

use super::error::EvalError;
use super::timestamp::parse_timestamp;
use super::token::{Loc, Token, TokenKind, LITERAL_TOKENS};

pub struct Lexer {
    chars: Vec<char>,
    file_path: Arc<str>,
    pos: usize,
    row: usize,
    bol: usize,
    peeked: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str, file_path: impl Into<Arc<str>>) -> Self {
        Self {
            chars: source.chars().collect(),
            file_path: file_path.into(),
            pos: 0,
            row: 0,
            bol: 0,
            peeked: None,
        }
    }

    /// Consume and return the next token. Returns an end-of-file token forever once exhausted.
    pub fn next(&mut self) -> Result<Token, EvalError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.chop_token(),
        }
    }

    /// Return the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token, EvalError> {
        if let Some(token) = &self.peeked {
            return Ok(token.clone());
        }
        let token = self.chop_token()?;
        self.peeked = Some(token.clone());
        Ok(token)
    }

    /// Lex the whole input, including the trailing end-of-file token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn loc(&self) -> Loc {
        Loc {
            file_path: Arc::clone(&self.file_path),
            row: self.row,
            col: self.pos - self.bol,
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.pos += 1;
            if ch == '\n' {
                self.row += 1;
                self.bol = self.pos;
            }
        }
    }

    fn starts_with(&self, prefix: &str) -> bool {
        let mut i = self.pos;
        for ch in prefix.chars() {
            if self.chars.get(i) != Some(&ch) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.current().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.starts_with("//") {
                while self.current().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.starts_with("/*") {
                while !self.is_at_end() && !self.starts_with("*/") {
                    self.advance();
                }
                // An unterminated block comment runs to the end of input.
                self.advance();
                self.advance();
                continue;
            }

            break;
        }
    }

    fn chop_token(&mut self) -> Result<Token, EvalError> {
        self.skip_whitespace_and_comments();

        let loc = self.loc();
        let Some(ch) = self.current() else {
            return Ok(Token::eof(loc));
        };

        if ch.is_ascii_digit() {
            return self.lex_timestamp(loc);
        }

        if ch.is_alphabetic() || ch == '_' {
            let text = self.take_while(|c| c.is_alphanumeric() || c == '_');
            return Ok(Token {
                kind: TokenKind::Symbol,
                text,
                timestamp: 0,
                loc,
            });
        }

        if ch == '"' || ch == '\'' {
            let text = self.lex_string(loc.clone())?;
            return Ok(Token::string(text, loc));
        }

        for &(literal, kind) in LITERAL_TOKENS {
            if self.starts_with(literal) {
                for _ in literal.chars() {
                    self.advance();
                }
                return Ok(Token {
                    kind,
                    text: literal.to_string(),
                    timestamp: 0,
                    loc,
                });
            }
        }

        Err(EvalError::lex(loc, format!("invalid token starting with `{ch}`")))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let begin = self.pos;
        while self.current().is_some_and(&pred) {
            self.advance();
        }
        self.chars[begin..self.pos].iter().collect()
    }

    fn lex_timestamp(&mut self, loc: Loc) -> Result<Token, EvalError> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == ':' || c == '.');
        let timestamp = parse_timestamp(&text)
            .map_err(|e| EvalError::lex(loc.clone(), format!("invalid timestamp `{text}`: {e}")))?;
        Ok(Token {
            kind: TokenKind::Timestamp,
            text,
            timestamp,
            loc,
        })
    }

    fn lex_string(&mut self, start: Loc) -> Result<String, EvalError> {
        let Some(quote) = self.current() else {
            return Err(EvalError::lex(start, "expected a string literal"));
        };
        self.advance();

        let mut lit = String::new();
        loop {
            let Some(ch) = self.current() else {
                return Err(EvalError::lex(
                    start,
                    format!("expected `{quote}` at the end of this string literal"),
                ));
            };

            if ch == quote {
                self.advance();
                return Ok(lit);
            }

            if ch != '\\' {
                lit.push(ch);
                self.advance();
                continue;
            }

            self.advance();
            let escape_loc = self.loc();
            let Some(esc) = self.current() else {
                return Err(EvalError::lex(escape_loc, "unfinished escape sequence"));
            };
            match esc {
                '0' => lit.push('\0'),
                'n' => lit.push('\n'),
                'r' => lit.push('\r'),
                '\\' => lit.push('\\'),
                'x' => {
                    self.advance();
                    lit.push(self.chop_hex_byte()?);
                    continue;
                }
                c if c == quote => lit.push(quote),
                c => {
                    return Err(EvalError::lex(
                        escape_loc,
                        format!("unknown escape sequence starting with `{c}`"),
                    ));
                }
            }
            self.advance();
        }
    }

    fn chop_hex_byte(&mut self) -> Result<char, EvalError> {
        let mut value: u8 = 0;
        for i in 0..2 {
            let loc = self.loc();
            let Some(ch) = self.current() else {
                return Err(EvalError::lex(
                    loc,
                    format!("unfinished hexadecimal value of a byte: expected 2 hex digits, but got {i}"),
                ));
            };
            let Some(digit) = ch.to_digit(16) else {
                return Err(EvalError::lex(loc, format!("expected hex digit, but got `{ch}`")));
            };
            value = value * 16 + digit as u8;
            self.advance();
        }
        Ok(char::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src, "test.markut").tokenize().unwrap()
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("   \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn lex_timestamps() {
        let tokens = lex("5 01:30 1:02:03.500");
        assert_eq!(tokens[0].timestamp, 5000);
        assert_eq!(tokens[1].timestamp, 90_000);
        assert_eq!(tokens[2].timestamp, 3_723_500);
        assert_eq!(tokens[2].text, "1:02:03.500");
    }

    #[test]
    fn lex_symbols() {
        let tokens = lex("chunk include_if_exists _x1");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Symbol));
        assert_eq!(tokens[1].text, "include_if_exists");
        assert_eq!(tokens[2].text, "_x1");
    }

    #[test]
    fn lex_punctuation() {
        assert_eq!(
            kinds("[ ] { } ( ) ... * - +"),
            vec![
                TokenKind::BracketOpen,
                TokenKind::BracketClose,
                TokenKind::CurlyOpen,
                TokenKind::CurlyClose,
                TokenKind::ParenOpen,
                TokenKind::ParenClose,
                TokenKind::Ellipsis,
                TokenKind::Asterisk,
                TokenKind::Dash,
                TokenKind::Plus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_string_escapes() {
        let tokens = lex(r#""a\nb\r\0\\\x41\"" 'it\'s'"#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "a\nb\r\0\\A\"");
        assert_eq!(tokens[1].text, "it's");
    }

    #[test]
    fn closing_quote_must_match_opening() {
        let tokens = lex(r#"'say "hi"'"#);
        assert_eq!(tokens[0].text, r#"say "hi""#);
    }

    #[test]
    fn lex_comments() {
        let src = "// line\n5 /* block\n spanning */ chunk // trailing";
        let tokens = lex(src);
        assert_eq!(tokens[0].kind, TokenKind::Timestamp);
        assert_eq!(tokens[1].kind, TokenKind::Symbol);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lex_locations() {
        let tokens = lex("input \"a.mp4\"\n  0 10 chunk");
        assert_eq!((tokens[0].loc.row, tokens[0].loc.col), (0, 0));
        assert_eq!((tokens[1].loc.row, tokens[1].loc.col), (0, 6));
        assert_eq!((tokens[2].loc.row, tokens[2].loc.col), (1, 2));
        assert_eq!((tokens[4].loc.row, tokens[4].loc.col), (1, 7));
        assert_eq!(tokens[4].loc.to_string(), "test.markut:2:8");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("chunk blur", "t");
        assert_eq!(lexer.peek().unwrap().text, "chunk");
        assert_eq!(lexer.peek().unwrap().text, "chunk");
        assert_eq!(lexer.next().unwrap().text, "chunk");
        assert_eq!(lexer.next().unwrap().text, "blur");
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn unterminated_string_is_located_at_opening_quote() {
        let err = Lexer::new("  \"abc", "t").tokenize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.diagnostics()[0].loc.col, 2);
    }

    #[test]
    fn unknown_escape_is_located_at_escape() {
        let err = Lexer::new(r#""ab\q""#, "t").tokenize().unwrap_err();
        assert_eq!(err.diagnostics()[0].loc.col, 4);
    }

    #[test]
    fn bad_hex_escape() {
        assert!(Lexer::new(r#""\x4""#, "t").tokenize().is_err());
        assert!(Lexer::new(r#""\xZZ""#, "t").tokenize().is_err());
    }

    #[test]
    fn invalid_timestamp_literal() {
        let err = Lexer::new("1:2:3:4", "t").tokenize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn invalid_token() {
        let err = Lexer::new("chunk @", "t").tokenize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.diagnostics()[0].loc.col, 6);
    }
}
