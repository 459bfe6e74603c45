//! Error types for the DSL lexer and evaluator.
//!
//! Every error carries the source location it was detected at. Semantic
//! errors often carry extra `NOTE` locations pointing at related tokens.

use std::fmt;
use std::io;

use thiserror::Error;

use super::token::Loc;

/// A supplementary location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub loc: Loc,
    pub message: String,
}

/// A located error message with optional notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub loc: Loc,
    pub message: String,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(loc: Loc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, loc: Loc, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            loc,
            message: message.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ERROR: {}", self.loc, self.message)?;
        for note in &self.notes {
            write!(f, "\n{}: NOTE: {}", note.loc, note.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    TypeCheck,
    Semantic,
    Residual,
    IncludeCycle,
    Io,
}

/// An error that aborted evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{0}")]
    Lex(Diagnostic),
    #[error("{0}")]
    TypeCheck(Diagnostic),
    #[error("{0}")]
    Semantic(Diagnostic),
    /// Leftover stack items or pending chapters, all of them.
    #[error("{}", render_all(.0))]
    Residual(Vec<Diagnostic>),
    #[error("{0}")]
    IncludeCycle(Diagnostic),
    #[error("ERROR: could not read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

fn render_all(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl EvalError {
    pub fn lex(loc: Loc, message: impl Into<String>) -> Self {
        EvalError::Lex(Diagnostic::new(loc, message))
    }

    pub fn type_check(loc: Loc, message: impl Into<String>) -> Self {
        EvalError::TypeCheck(Diagnostic::new(loc, message))
    }

    pub fn semantic(loc: Loc, message: impl Into<String>) -> Self {
        EvalError::Semantic(Diagnostic::new(loc, message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Lex(_) => ErrorKind::Lex,
            EvalError::TypeCheck(_) => ErrorKind::TypeCheck,
            EvalError::Semantic(_) => ErrorKind::Semantic,
            EvalError::Residual(_) => ErrorKind::Residual,
            EvalError::IncludeCycle(_) => ErrorKind::IncludeCycle,
            EvalError::Io { .. } => ErrorKind::Io,
        }
    }

    /// All located diagnostics carried by this error (empty for I/O failures).
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        match self {
            EvalError::Lex(d)
            | EvalError::TypeCheck(d)
            | EvalError::Semantic(d)
            | EvalError::IncludeCycle(d) => vec![d],
            EvalError::Residual(ds) => ds.iter().collect(),
            EvalError::Io { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, col: usize) -> Loc {
        Loc::new("a.markut", row, col)
    }

    #[test]
    fn diagnostic_renders_notes_on_following_lines() {
        let diag = Diagnostic::new(loc(2, 0), "the end of the chunk is earlier than its start")
            .with_note(loc(1, 4), "the start is located here");
        assert_eq!(
            diag.to_string(),
            "a.markut:3:1: ERROR: the end of the chunk is earlier than its start\n\
             a.markut:2:5: NOTE: the start is located here"
        );
    }

    #[test]
    fn residual_lists_every_item() {
        let err = EvalError::Residual(vec![
            Diagnostic::new(loc(0, 0), "unused argument"),
            Diagnostic::new(loc(0, 3), "unused argument"),
        ]);
        assert_eq!(err.kind(), ErrorKind::Residual);
        assert_eq!(err.diagnostics().len(), 2);
        assert_eq!(
            err.to_string(),
            "a.markut:1:1: ERROR: unused argument\na.markut:1:4: ERROR: unused argument"
        );
    }

    #[test]
    fn io_error_has_no_diagnostics() {
        let err = EvalError::Io {
            path: "missing.markut".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.diagnostics().is_empty());
    }
}
