//! Chunks, chapters and cuts: the data an evaluation hands to the renderer.

use std::fmt::Write;

use crate::chat::ChatMessageGroup;
use crate::dsl::timestamp::Millis;
use crate::dsl::token::Loc;

/// YouTube rejects chapter lists where any chapter is shorter than this.
pub const MIN_YOUTUBE_CHAPTER_DURATION: Millis = 10_000;

/// A half-open region `[start, end)` of one input video.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub start: Millis,
    pub end: Millis,
    /// Location of the `chunk` call that defined it.
    pub loc: Loc,
    pub input_path: String,
    /// Chat groups with offsets in `[start, end]`, captured at definition time.
    pub chat_log: Vec<ChatMessageGroup>,
    pub blur: bool,
    pub unfinished: bool,
}

impl Chunk {
    pub fn duration(&self) -> Millis {
        self.end - self.start
    }

    /// Artifact name, a pure function of input path, bounds and blur flag.
    ///
    /// Two chunks with the same name render to the same file, so an existing
    /// artifact can be reused.
    pub fn name(&self) -> String {
        let suffix = if self.blur { "-blur" } else { "" };
        format!(
            "{}-{:09}-{:09}{suffix}.mp4",
            sanitize_path(&self.input_path),
            self.start,
            self.end
        )
    }
}

/// Escape `path` into a file-name-safe string without collisions.
///
/// ASCII alphanumerics, `.` and `-` are kept. `_` becomes `__` and every other
/// byte of the UTF-8 encoding becomes `_XX` in uppercase hex, so distinct paths
/// always map to distinct names.
pub fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'_' => out.push_str("__"),
            b if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' => out.push(char::from(b)),
            b => {
                let _ = write!(out, "_{b:02X}");
            }
        }
    }
    out
}

/// A labeled timestamp on the final concatenated timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub loc: Loc,
    pub timestamp: Millis,
    pub label: String,
}

/// A preview clip around the boundary between chunk `chunk` and `chunk + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cut {
    pub chunk: usize,
    pub pad: Millis,
}
