//! SRT subtitles built from the chat captured by each chunk.

use crate::chunk::Chunk;
use crate::dsl::timestamp::Millis;

/// Longest time a chat message group stays on screen.
pub const MAX_CAPTION_DURATION: Millis = 5_000;

/// SRT timestamps use a comma before the milliseconds: `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(millis: Millis) -> String {
    let m = millis.max(0);
    format!(
        "{:02}:{:02}:{:02},{:03}",
        m / 3_600_000,
        m / 60_000 % 60,
        m / 1000 % 60,
        m % 1000
    )
}

/// Captions for the concatenation of `chunks`, in final-timeline time.
///
/// Each message group is shown from its offset until the next group starts,
/// for at most [`MAX_CAPTION_DURATION`] and never past the end of its chunk.
pub fn chunks_to_srt(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut counter = 1;
    let mut base: Millis = 0;

    for chunk in chunks {
        let groups = &chunk.chat_log;
        for (i, group) in groups.iter().enumerate() {
            let start = group.offset - chunk.start;
            let next = groups
                .get(i + 1)
                .map(|g| g.offset - chunk.start)
                .unwrap_or(chunk.duration());
            let end = next
                .min(start.saturating_add(MAX_CAPTION_DURATION))
                .min(chunk.duration());
            if end <= start {
                continue;
            }

            out.push_str(&format!(
                "{counter}\n{} --> {}\n",
                format_srt_timestamp(base + start),
                format_srt_timestamp(base + end)
            ));
            for message in &group.messages {
                out.push_str(&format!("{}: {}\n", message.nickname, message.text));
            }
            out.push('\n');
            counter += 1;
        }
        base += chunk.duration();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatMessageGroup};
    use crate::dsl::token::Loc;

    fn group(offset: Millis, nick: &str, text: &str) -> ChatMessageGroup {
        ChatMessageGroup {
            offset,
            messages: vec![ChatMessage {
                nickname: nick.into(),
                color: "#FFFFFF".into(),
                text: text.into(),
            }],
        }
    }

    fn chunk(start: Millis, end: Millis, chat_log: Vec<ChatMessageGroup>) -> Chunk {
        Chunk {
            start,
            end,
            loc: Loc::new("a.markut", 0, 0),
            input_path: "in.mp4".into(),
            chat_log,
            blur: false,
            unfinished: false,
        }
    }

    #[test]
    fn srt_timestamp_format() {
        assert_eq!(format_srt_timestamp(3_723_004), "01:02:03,004");
        assert_eq!(format_srt_timestamp(-5), "00:00:00,000");
    }

    #[test]
    fn captions_are_rebased_and_capped() {
        let c = chunk(
            10_000,
            30_000,
            vec![group(11_000, "alice", "hi"), group(12_000, "bob", "yo"), group(29_000, "eve", "bye")],
        );
        let srt = chunks_to_srt(&[c]);
        let expected = "1\n00:00:01,000 --> 00:00:02,000\nalice: hi\n\n\
                        2\n00:00:02,000 --> 00:00:07,000\nbob: yo\n\n\
                        3\n00:00:19,000 --> 00:00:20,000\neve: bye\n\n";
        assert_eq!(srt, expected);
    }

    #[test]
    fn later_chunks_are_offset_by_earlier_durations() {
        let a = chunk(0, 10_000, vec![]);
        let b = chunk(50_000, 60_000, vec![group(51_000, "x", "y")]);
        let srt = chunks_to_srt(&[a, b]);
        assert!(srt.starts_with("1\n00:00:11,000 --> 00:00:16,000\n"));
    }

    #[test]
    fn no_chat_no_captions() {
        assert!(chunks_to_srt(&[chunk(0, 1000, vec![])]).is_empty());
    }
}
