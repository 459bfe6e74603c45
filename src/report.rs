//! Plain-text summaries of an evaluated context.

use std::fmt::Write;

use crate::dsl::timestamp::{format_timestamp, format_timestamp_secs, Millis};
use crate::dsl::EvalContext;

/// YouTube description chapter list: `- HH:MM:SS - Label` per line.
pub fn chapters(context: &EvalContext) -> String {
    context
        .chapters
        .iter()
        .map(|c| format!("- {} - {}\n", format_timestamp_secs(c.timestamp), c.label))
        .collect()
}

/// One line per chunk with its source location, bounds and artifact name.
pub fn chunks(context: &EvalContext) -> String {
    let mut out = String::new();
    for (i, chunk) in context.chunks.iter().enumerate() {
        let _ = write!(
            out,
            "{}: chunk {i}: {} - {} ({}) {}",
            chunk.loc,
            format_timestamp(chunk.start),
            format_timestamp(chunk.end),
            format_timestamp(chunk.duration()),
            chunk.name(),
        );
        if chunk.blur {
            out.push_str(" [blur]");
        }
        if chunk.unfinished {
            out.push_str(" [unfinished]");
        }
        out.push('\n');
    }
    out
}

/// Where each requested cut lands on the final timeline.
pub fn cuts(context: &EvalContext) -> String {
    let mut out = String::new();
    for cut in &context.cuts {
        let Some(chunk) = context.chunks.get(cut.chunk) else {
            continue;
        };
        let at: Millis = context.chunks[..=cut.chunk]
            .iter()
            .map(|c| c.duration())
            .sum();
        let _ = writeln!(
            out,
            "{}: {}: cut-{:02}.mp4 (pad {})",
            chunk.loc,
            format_timestamp(at),
            cut.chunk,
            format_timestamp(cut.pad),
        );
    }
    out
}

/// Total length of the final video.
pub fn total_duration(context: &EvalContext) -> Millis {
    context.chunks.iter().map(|c| c.duration()).sum()
}

/// Everything above, under headings.
pub fn summary(context: &EvalContext) -> String {
    let unfinished = context.chunks.iter().filter(|c| c.unfinished).count();
    let mut out = String::new();
    out.push_str("Chunks:\n");
    out.push_str(&chunks(context));
    out.push_str("\nCuts:\n");
    out.push_str(&cuts(context));
    out.push_str("\nChapters:\n");
    out.push_str(&chapters(context));
    let _ = writeln!(
        out,
        "\nTotal duration: {} ({} chunks, {unfinished} unfinished)",
        format_timestamp(total_duration(context)),
        context.chunks.len(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Evaluator;

    fn context(src: &str) -> EvalContext {
        Evaluator::eval_source(src, "t.markut").unwrap()
    }

    #[test]
    fn chapter_list() {
        let ctx = context("\"Intro\" 0 chapter \"Talk\" 1:05 chapter 0 2:00 chunk");
        assert_eq!(chapters(&ctx), "- 00:00:00 - Intro\n- 00:01:05 - Talk\n");
    }

    #[test]
    fn chunk_lines_mark_flags() {
        let ctx = context("\"in.mp4\" input 0 10 chunk 20 30 chunk blur unfinished");
        let text = chunks(&ctx);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("t.markut:1:21: chunk 0: 00:00:00.000 - 00:00:10.000"));
        assert!(lines[1].ends_with("-blur.mp4 [blur] [unfinished]"));
    }

    #[test]
    fn cut_positions() {
        let ctx = context("0 10 chunk 20 35 chunk 1 cut 40 50 chunk");
        assert_eq!(
            cuts(&ctx),
            "t.markut:1:18: 00:00:25.000: cut-01.mp4 (pad 00:00:01.000)\n"
        );
    }

    #[test]
    fn summary_totals() {
        let ctx = context("0 10 chunk 20 35 chunk unfinished");
        assert_eq!(total_duration(&ctx), 25_000);
        assert!(summary(&ctx).contains("Total duration: 00:00:25.000 (2 chunks, 1 unfinished)"));
    }
}
