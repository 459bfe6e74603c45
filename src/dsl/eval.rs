//! Stack machine evaluator.
//!
//! Executes a token stream against an [`EvalContext`]. Literals are pushed on
//! the operand stack, `-`/`+` do timestamp arithmetic, and symbols run
//! [`Command`]s which pop their arguments and mutate the context.
//!
//! Included files are evaluated recursively in the same context, sharing the
//! operand stack and every accumulator.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::chat::{load_chat_log, offset_chat_log, slice_chat_log, ChatMessageGroup};
use crate::chunk::{Chapter, Chunk, Cut, MIN_YOUTUBE_CHAPTER_DURATION};

use super::command::Command;
use super::error::{Diagnostic, EvalError};
use super::lexer::Lexer;
use super::timestamp::{format_timestamp, Millis};
use super::token::{Loc, Token, TokenKind};

/// Nesting limit for `include`, on top of the cycle check.
pub const MAX_INCLUDE_DEPTH: usize = 64;

pub const DEFAULT_OUTPUT_PATH: &str = "output.mp4";

/// Accumulated state of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub input_path: String,
    pub output_path: String,
    /// Full chat log of the current input, sorted by offset.
    pub chat_log: Vec<ChatMessageGroup>,
    pub chunks: Vec<Chunk>,
    pub chapters: Vec<Chapter>,
    pub cuts: Vec<Cut>,
    pub args_stack: Vec<Token>,
    /// Chapters declared since the last `chunk`, in input-file time.
    pub chapter_stack: Vec<Chapter>,
    /// Sum of the durations of all chunks defined so far.
    pub chapter_offset: Millis,
    pub video_codec: Option<Token>,
    pub video_bitrate: Option<Token>,
    pub audio_codec: Option<Token>,
    pub audio_bitrate: Option<Token>,
    pub extra_outflags: Vec<String>,
    pub extra_inflags: Vec<String>,
    /// Index into `chapters` where each chunk's attached chapters begin.
    chunk_chapter_starts: Vec<usize>,
    /// Files currently being evaluated, outermost first.
    include_stack: Vec<PathBuf>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            chat_log: Vec::new(),
            chunks: Vec::new(),
            chapters: Vec::new(),
            cuts: Vec::new(),
            args_stack: Vec::new(),
            chapter_stack: Vec::new(),
            chapter_offset: 0,
            video_codec: None,
            video_bitrate: None,
            audio_codec: None,
            audio_bitrate: None,
            extra_outflags: Vec::new(),
            extra_inflags: Vec::new(),
            chunk_chapter_starts: Vec::new(),
            include_stack: Vec::new(),
        }
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a markut file from disk.
    pub fn eval_file(&mut self, path: &Path) -> Result<(), EvalError> {
        let content = std::fs::read_to_string(path).map_err(|source| EvalError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.enter_file(path, None)?;
        let result = self.eval_source(&content, &path.display().to_string());
        self.include_stack.pop();
        result
    }

    /// Evaluate source text. `file_path` is only used for locations.
    pub fn eval_source(&mut self, source: &str, file_path: &str) -> Result<(), EvalError> {
        let mut lexer = Lexer::new(source, file_path);
        loop {
            let token = lexer.next()?;
            match token.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::String | TokenKind::Timestamp => self.args_stack.push(token),
                TokenKind::Dash => {
                    let args = self.type_check_args(&token, &[TokenKind::Timestamp; 2])?;
                    let value = args[0].timestamp.checked_sub(args[1].timestamp);
                    self.push_arithmetic(&token, &args, value)?;
                }
                TokenKind::Plus => {
                    let args = self.type_check_args(&token, &[TokenKind::Timestamp; 2])?;
                    let value = args[0].timestamp.checked_add(args[1].timestamp);
                    self.push_arithmetic(&token, &args, value)?;
                }
                TokenKind::Symbol => {
                    let command = Command::from_name(&token.text).ok_or_else(|| {
                        EvalError::semantic(
                            token.loc.clone(),
                            format!("unknown command `{}`", token.text),
                        )
                    })?;
                    self.execute(command, &token)?;
                }
                kind => {
                    return Err(EvalError::semantic(
                        token.loc,
                        format!("unexpected token {kind}"),
                    ));
                }
            }
        }
    }

    /// Validate the context once every file has been evaluated.
    ///
    /// Chapters are sorted into final-timeline order and checked against the
    /// minimal YouTube chapter duration. Any leftover stack entries or pending
    /// chapters are reported together.
    pub fn finish(&mut self) -> Result<(), EvalError> {
        self.chapters.sort_by_key(|c| c.timestamp);

        for pair in self.chapters.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            let duration = next.timestamp - current.timestamp;
            if duration < MIN_YOUTUBE_CHAPTER_DURATION {
                return Err(EvalError::Semantic(
                    Diagnostic::new(
                        current.loc.clone(),
                        format!(
                            "the chapter \"{}\" has duration {} which is shorter than the minimal allowed YouTube chapter duration {}",
                            current.label,
                            format_timestamp(duration),
                            format_timestamp(MIN_YOUTUBE_CHAPTER_DURATION),
                        ),
                    )
                    .with_note(
                        next.loc.clone(),
                        format!("the chapter ends where \"{}\" begins", next.label),
                    ),
                ));
            }
        }

        let residual: Vec<Diagnostic> = self
            .args_stack
            .iter()
            .map(|t| Diagnostic::new(t.loc.clone(), "unused argument"))
            .chain(
                self.chapter_stack
                    .iter()
                    .map(|c| Diagnostic::new(c.loc.clone(), "unused chapter")),
            )
            .collect();
        if !residual.is_empty() {
            return Err(EvalError::Residual(residual));
        }

        Ok(())
    }

    /// Pop arguments matching `signature`, deepest first.
    ///
    /// On underflow or a kind mismatch the stack is left untouched.
    pub fn type_check_args(
        &mut self,
        token: &Token,
        signature: &[TokenKind],
    ) -> Result<Vec<Token>, EvalError> {
        let n = self.args_stack.len();
        if n < signature.len() {
            return Err(EvalError::type_check(
                token.loc.clone(),
                format!(
                    "`{}` expected {} arguments but got {}",
                    token.text,
                    signature.len(),
                    n
                ),
            ));
        }

        let base = n - signature.len();
        // Check from the top of the stack down so the first reported mismatch is the shallowest.
        for (i, &expected) in signature.iter().enumerate().rev() {
            let arg = &self.args_stack[base + i];
            if arg.kind != expected {
                return Err(EvalError::TypeCheck(
                    Diagnostic::new(
                        arg.loc.clone(),
                        format!("expected {expected} but got {}", arg.kind),
                    )
                    .with_note(
                        token.loc.clone(),
                        format!("type check failed for `{}`", token.text),
                    ),
                ));
            }
        }

        Ok(self.args_stack.split_off(base))
    }

    /// Push the result of a binary operator, or restore its operands if it overflowed.
    fn push_arithmetic(
        &mut self,
        token: &Token,
        args: &[Token],
        value: Option<Millis>,
    ) -> Result<(), EvalError> {
        match value {
            Some(value) => {
                self.args_stack
                    .push(Token::timestamp(value, token.loc.clone()));
                Ok(())
            }
            None => {
                self.args_stack.extend_from_slice(args);
                Err(overflow(&token.loc))
            }
        }
    }

    fn require_arity(&self, token: &Token, arity: usize) -> Result<(), EvalError> {
        if self.args_stack.len() < arity {
            return Err(EvalError::type_check(
                token.loc.clone(),
                format!(
                    "`{}` expected {} arguments but got {}",
                    token.text,
                    arity,
                    self.args_stack.len()
                ),
            ));
        }
        Ok(())
    }

    fn pop_string(&mut self, token: &Token) -> Result<Token, EvalError> {
        let mut args = self.type_check_args(token, &[TokenKind::String])?;
        Ok(args.remove(0))
    }

    fn pop_timestamp(&mut self, token: &Token) -> Result<Token, EvalError> {
        let mut args = self.type_check_args(token, &[TokenKind::Timestamp])?;
        Ok(args.remove(0))
    }

    fn last_chunk_index(&self, token: &Token) -> Result<usize, EvalError> {
        self.chunks.len().checked_sub(1).ok_or_else(|| {
            EvalError::semantic(
                token.loc.clone(),
                format!("`{}` requires a previously defined chunk", token.text),
            )
        })
    }

    fn execute(&mut self, command: Command, token: &Token) -> Result<(), EvalError> {
        match command {
            Command::Input => {
                let path = self.pop_string(token)?;
                if path.text.is_empty() {
                    return Err(EvalError::semantic(path.loc, "cannot set empty input path"));
                }
                self.input_path = path.text;
            }
            Command::Output => {
                let path = self.pop_string(token)?;
                if path.text.is_empty() {
                    return Err(EvalError::semantic(path.loc, "cannot set empty output path"));
                }
                self.output_path = path.text;
            }
            Command::Chunk => self.define_chunk(token)?,
            Command::Blur => {
                let index = self.last_chunk_index(token)?;
                self.chunks[index].blur = true;
            }
            Command::Unfinished => {
                let index = self.last_chunk_index(token)?;
                self.chunks[index].unfinished = true;
            }
            Command::Removed => self.remove_last_chunk(token)?,
            Command::Cut => {
                let pad = self.pop_timestamp(token)?;
                if pad.timestamp < 0 {
                    return Err(EvalError::semantic(
                        pad.loc,
                        format!("cut padding {} is negative", format_timestamp(pad.timestamp)),
                    ));
                }
                let chunk = self.last_chunk_index(token)?;
                self.cuts.push(Cut {
                    chunk,
                    pad: pad.timestamp,
                });
            }
            Command::Chapter => {
                let args = self.type_check_args(token, &[TokenKind::String, TokenKind::Timestamp])?;
                let (label, timestamp) = (&args[0], &args[1]);
                self.chapter_stack.push(Chapter {
                    loc: timestamp.loc.clone(),
                    timestamp: timestamp.timestamp,
                    label: label.text.clone(),
                });
            }
            Command::Chat => {
                let path = self.pop_string(token)?;
                self.chat_log = load_chat_log(Path::new(&path.text))
                    .map_err(|e| EvalError::semantic(path.loc.clone(), e.to_string()))?;
                debug!(path = %path.text, groups = self.chat_log.len(), "loaded chat log");
            }
            Command::ChatOffset => {
                let args =
                    self.type_check_args(token, &[TokenKind::Timestamp, TokenKind::Timestamp])?;
                let (start, end) = (&args[0], &args[1]);
                if start.timestamp < 0 {
                    return Err(EvalError::semantic(
                        start.loc.clone(),
                        format!(
                            "chat offset start {} is negative",
                            format_timestamp(start.timestamp)
                        ),
                    ));
                }
                if start.timestamp > end.timestamp {
                    return Err(EvalError::Semantic(
                        Diagnostic::new(
                            end.loc.clone(),
                            format!(
                                "the end of the chat offset {} is earlier than its start {}",
                                format_timestamp(end.timestamp),
                                format_timestamp(start.timestamp)
                            ),
                        )
                        .with_note(start.loc.clone(), "the start is located here"),
                    ));
                }
                offset_chat_log(&mut self.chat_log, start.timestamp, end.timestamp);
            }
            Command::NoChat => self.chat_log.clear(),
            Command::Dup => {
                self.require_arity(token, 1)?;
                let top = self.args_stack[self.args_stack.len() - 1].clone();
                self.args_stack.push(top);
            }
            Command::Over => {
                self.require_arity(token, 2)?;
                let second = self.args_stack[self.args_stack.len() - 2].clone();
                self.args_stack.push(second);
            }
            Command::Swap => {
                self.require_arity(token, 2)?;
                let n = self.args_stack.len();
                self.args_stack.swap(n - 1, n - 2);
            }
            Command::Drop => {
                self.require_arity(token, 1)?;
                self.args_stack.pop();
            }
            Command::Concat => {
                let args = self.type_check_args(token, &[TokenKind::String, TokenKind::String])?;
                let text = format!("{}{}", args[0].text, args[1].text);
                self.args_stack.push(Token::string(text, token.loc.clone()));
            }
            Command::VideoCodec => self.video_codec = Some(self.pop_string(token)?),
            Command::VideoBitrate => self.video_bitrate = Some(self.pop_string(token)?),
            Command::AudioCodec => self.audio_codec = Some(self.pop_string(token)?),
            Command::AudioBitrate => self.audio_bitrate = Some(self.pop_string(token)?),
            Command::Outf => {
                let flag = self.pop_string(token)?;
                self.extra_outflags.push(flag.text);
            }
            Command::Inf => {
                let flag = self.pop_string(token)?;
                self.extra_inflags.push(flag.text);
            }
            Command::Include => {
                let path = self.pop_string(token)?;
                self.include_file(&path)?;
            }
            Command::IncludeIfExists => {
                let path = self.pop_string(token)?;
                if Path::new(&path.text).exists() {
                    self.include_file(&path)?;
                } else {
                    debug!(path = %path.text, "skipping include of missing file");
                }
            }
            Command::Here => {
                self.args_stack
                    .push(Token::string(token.loc.to_string(), token.loc.clone()));
            }
            Command::ChunkLocation => {
                let index = self.last_chunk_index(token)?;
                let text = self.chunks[index].loc.to_string();
                self.args_stack.push(Token::string(text, token.loc.clone()));
            }
            Command::ChunkNumber => {
                let index = self.last_chunk_index(token)?;
                self.args_stack
                    .push(Token::string(index.to_string(), token.loc.clone()));
            }
            Command::ChunkDuration => {
                let index = self.last_chunk_index(token)?;
                let duration = self.chunks[index].duration();
                self.args_stack
                    .push(Token::timestamp(duration, token.loc.clone()));
            }
        }
        Ok(())
    }

    fn define_chunk(&mut self, token: &Token) -> Result<(), EvalError> {
        let args = self.type_check_args(token, &[TokenKind::Timestamp, TokenKind::Timestamp])?;
        let (start, end) = (&args[0], &args[1]);

        for bound in [start, end] {
            if bound.timestamp < 0 {
                return Err(EvalError::semantic(
                    bound.loc.clone(),
                    format!(
                        "chunk bound {} is negative",
                        format_timestamp(bound.timestamp)
                    ),
                ));
            }
        }

        if start.timestamp > end.timestamp {
            return Err(EvalError::Semantic(
                Diagnostic::new(
                    end.loc.clone(),
                    format!(
                        "the end of the chunk {} is earlier than its start {}",
                        format_timestamp(end.timestamp),
                        format_timestamp(start.timestamp)
                    ),
                )
                .with_note(start.loc.clone(), "the start is located here"),
            ));
        }

        if let Some(chapter) = self
            .chapter_stack
            .iter()
            .find(|c| c.timestamp < start.timestamp || c.timestamp > end.timestamp)
        {
            return Err(EvalError::Semantic(
                Diagnostic::new(
                    chapter.loc.clone(),
                    format!(
                        "the timestamp {} of chapter \"{}\" is outside of the current chunk",
                        format_timestamp(chapter.timestamp),
                        chapter.label
                    ),
                )
                .with_note(
                    start.loc.clone(),
                    format!("which starts at {}", format_timestamp(start.timestamp)),
                )
                .with_note(
                    end.loc.clone(),
                    format!("and ends at {}", format_timestamp(end.timestamp)),
                ),
            ));
        }

        let chunk = Chunk {
            start: start.timestamp,
            end: end.timestamp,
            loc: token.loc.clone(),
            input_path: self.input_path.clone(),
            chat_log: slice_chat_log(&self.chat_log, start.timestamp, end.timestamp).to_vec(),
            blur: false,
            unfinished: false,
        };

        // Chapters lie within [start, end], so only the offset sums can overflow.
        let chapter_offset = self
            .chapter_offset
            .checked_add(chunk.duration())
            .ok_or_else(|| overflow(&token.loc))?;

        self.chunk_chapter_starts.push(self.chapters.len());
        for chapter in self.chapter_stack.drain(..) {
            self.chapters.push(Chapter {
                loc: chapter.loc,
                timestamp: chapter.timestamp - chunk.start + self.chapter_offset,
                label: chapter.label,
            });
        }
        self.chapter_offset = chapter_offset;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Undo the most recent `chunk`: its chapters, its cuts and its share of the chapter offset.
    fn remove_last_chunk(&mut self, token: &Token) -> Result<(), EvalError> {
        let index = self.last_chunk_index(token)?;
        let chunk = self.chunks.remove(index);
        if let Some(first_chapter) = self.chunk_chapter_starts.pop() {
            let dropped = self.chapters.len() - first_chapter;
            if dropped > 0 {
                debug!(count = dropped, "dropping chapters of removed chunk");
            }
            self.chapters.truncate(first_chapter);
        }
        self.cuts.retain(|cut| cut.chunk != index);
        self.chapter_offset -= chunk.duration();
        Ok(())
    }

    fn enter_file(&mut self, path: &Path, from: Option<&Loc>) -> Result<(), EvalError> {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let loc = from
            .cloned()
            .unwrap_or_else(|| Loc::new(path.display().to_string(), 0, 0));

        if self.include_stack.contains(&canonical) {
            let mut diag = Diagnostic::new(
                loc,
                format!("include cycle: {} is already being evaluated", path.display()),
            );
            for (depth, file) in self.include_stack.iter().enumerate() {
                diag = diag.with_note(
                    Loc::new(file.display().to_string(), 0, 0),
                    format!("included at depth {depth}"),
                );
            }
            return Err(EvalError::IncludeCycle(diag));
        }

        if self.include_stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(EvalError::IncludeCycle(Diagnostic::new(
                loc,
                format!("include depth limit of {MAX_INCLUDE_DEPTH} exceeded"),
            )));
        }

        self.include_stack.push(canonical);
        Ok(())
    }

    fn include_file(&mut self, path: &Token) -> Result<(), EvalError> {
        let file = Path::new(&path.text);
        let content = std::fs::read_to_string(file).map_err(|e| {
            EvalError::semantic(
                path.loc.clone(),
                format!("could not include file {}: {e}", path.text),
            )
        })?;
        self.enter_file(file, Some(&path.loc))?;
        debug!(path = %path.text, depth = self.include_stack.len(), "including file");
        let result = self.eval_source(&content, &path.text);
        self.include_stack.pop();
        result
    }
}

fn overflow(loc: &Loc) -> EvalError {
    EvalError::semantic(loc.clone(), "timestamp arithmetic overflows")
}
