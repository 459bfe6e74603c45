//! Chat log: loading, slicing and offsetting the chat messages recorded alongside a stream.
//!
//! The log is a list of [`ChatMessageGroup`]s sorted ascending by offset, with
//! messages sharing an offset coalesced into one group.

use std::path::Path;

use thiserror::Error;

use crate::dsl::timestamp::{parse_timestamp, Millis};

/// Header emitted by common chat downloaders; skipped when it is the first line.
const CSV_HEADER_PREFIX: &str = "time,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub nickname: String,
    pub color: String,
    pub text: String,
}

/// All messages posted at the same offset from the start of the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageGroup {
    pub offset: Millis,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("could not read chat log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: malformed chat log record: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },
}

/// Load a chat log file from disk. See [`parse_chat_log`] for the format.
pub fn load_chat_log(path: &Path) -> Result<Vec<ChatMessageGroup>, ChatLogError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ChatLogError::Io {
        path: display.clone(),
        source,
    })?;
    parse_chat_log(&content, &display)
}

/// Parse `offsetSeconds,nickname,colorHex,"message text"` records, one per line.
///
/// A leading header line is skipped and an empty line ends the log. The result
/// is sorted by offset with same-offset messages coalesced.
pub fn parse_chat_log(content: &str, path: &str) -> Result<Vec<ChatMessageGroup>, ChatLogError> {
    let mut entries: Vec<(Millis, ChatMessage)> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if index == 0 && line.starts_with(CSV_HEADER_PREFIX) {
            continue;
        }

        let malformed = |reason: String| ChatLogError::Malformed {
            path: path.to_string(),
            line: index + 1,
            reason,
        };

        let fields: Vec<&str> = line.splitn(4, ',').collect();
        let &[offset, nickname, color, text] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 4 comma separated fields, but got {}",
                fields.len()
            )));
        };

        let offset = parse_timestamp(offset.trim())
            .map_err(|e| malformed(format!("invalid offset `{offset}`: {e}")))?;

        entries.push((
            offset,
            ChatMessage {
                nickname: nickname.to_string(),
                color: color.to_string(),
                text: unquote(text),
            },
        ));
    }

    entries.sort_by_key(|(offset, _)| *offset);
    Ok(coalesce(entries))
}

fn unquote(field: &str) -> String {
    match field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

fn coalesce(entries: Vec<(Millis, ChatMessage)>) -> Vec<ChatMessageGroup> {
    let mut groups: Vec<ChatMessageGroup> = Vec::new();
    for (offset, message) in entries {
        match groups.last_mut() {
            Some(last) if last.offset == offset => last.messages.push(message),
            _ => groups.push(ChatMessageGroup {
                offset,
                messages: vec![message],
            }),
        }
    }
    groups
}

/// The contiguous run of groups whose offset lies in `[start, end]`.
///
/// `log` must be sorted ascending by offset. An empty range is not an error.
pub fn slice_chat_log(log: &[ChatMessageGroup], start: Millis, end: Millis) -> &[ChatMessageGroup] {
    let lower = log.partition_point(|g| g.offset < start);
    let upper = log.partition_point(|g| g.offset <= end);
    if lower >= upper {
        return &[];
    }
    &log[lower..upper]
}

/// Drop every group in `[start, end]` and shift later groups back by `end - start`.
///
/// Used to compensate for a pause in the recording.
pub fn offset_chat_log(log: &mut Vec<ChatMessageGroup>, start: Millis, end: Millis) {
    let delta = end.saturating_sub(start);
    log.retain(|g| g.offset < start || g.offset > end);
    for group in log.iter_mut().filter(|g| g.offset > end) {
        group.offset = group.offset.saturating_sub(delta);
    }
}
