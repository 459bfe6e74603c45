//! Markut DSL: source text to tokens, tokens to a stack machine, and the resulting [`EvalContext`].

pub mod command;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod timestamp;
pub mod token;

use std::path::Path;

pub use command::{Category, Command};
pub use error::{Diagnostic, ErrorKind, EvalError};
pub use eval::EvalContext;
pub use timestamp::Millis;
pub use token::{Loc, Token, TokenKind};

use lexer::Lexer;

/// Entry points for evaluating markut programs.
pub struct Evaluator;

impl Evaluator {
    /// Lex source text into tokens, including the trailing end-of-file token.
    pub fn tokenize(source: &str, file_path: &str) -> Result<Vec<Token>, EvalError> {
        Lexer::new(source, file_path).tokenize()
    }

    /// Evaluate and validate a single in-memory program.
    pub fn eval_source(source: &str, file_path: &str) -> Result<EvalContext, EvalError> {
        let mut context = EvalContext::new();
        context.eval_source(source, file_path)?;
        context.finish()?;
        Ok(context)
    }

    /// Evaluate files in order into one context, after an optional user config file.
    pub fn eval_files<P: AsRef<Path>>(
        user_config: Option<&Path>,
        paths: &[P],
    ) -> Result<EvalContext, EvalError> {
        let mut context = EvalContext::new();
        if let Some(config) = user_config.filter(|p| p.exists()) {
            tracing::debug!(path = %config.display(), "evaluating user config");
            context.eval_file(config)?;
        }
        for path in paths {
            context.eval_file(path.as_ref())?;
        }
        context.finish()?;
        Ok(context)
    }
}
