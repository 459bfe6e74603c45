//! Full pipeline integration tests: markut files on disk to evaluated context, reports and ffmpeg plans.

use std::fs;
use std::path::{Path, PathBuf};

use markut::dsl::eval::MAX_INCLUDE_DEPTH;
use markut::dsl::{ErrorKind, Evaluator};
use markut::render::{EncodeParams, Ffmpeg, Renderer};
use markut::report;

/// Helper: write `content` to `dir/name` and return the path.
fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write failed");
    path
}

fn stream_src(chat_path: &Path) -> String {
    format!(
        r#"
// Morning stream
"vods/morning.mp4" input
"{}" chat

"Intro" 0:00 chapter
0:00 5:00 chunk

// Skip the break
"Coding" 12:00 chapter
10:00 25:00 chunk
    1 cut

"Raid" 40:00 chapter
40:00 41:00 chunk blur
"#,
        chat_path.display()
    )
}

// =============================================================================
// Test 1: A realistic program evaluates into chunks, chapters, cuts and chat
// =============================================================================

#[test]
fn stream_program_evaluates() {
    let dir = tempfile::tempdir().unwrap();
    let chat = write(
        dir.path(),
        "chat.csv",
        "time,user_name,user_color,message\n\
         30,alice,#FF0000,\"hello, chat\"\n\
         30,bob,#00FF00,hi\n\
         700,carol,#0000FF,lol\n\
         2420,dave,#FFFFFF,raid!\n",
    );
    let markut = write(dir.path(), "stream.markut", &stream_src(&chat));

    let ctx = Evaluator::eval_files::<PathBuf>(None, &[markut]).unwrap();

    assert_eq!(ctx.input_path, "vods/morning.mp4");
    assert_eq!(ctx.chunks.len(), 3);
    assert_eq!(ctx.chunks[0].chat_log.len(), 1);
    assert_eq!(ctx.chunks[0].chat_log[0].messages.len(), 2);
    assert_eq!(ctx.chunks[1].chat_log.len(), 1);
    assert_eq!(ctx.chunks[1].chat_log[0].messages[0].nickname, "carol");
    assert_eq!(ctx.chunks[2].chat_log[0].messages[0].text, "raid!");
    assert!(ctx.chunks[2].blur);

    let stamps: Vec<i64> = ctx.chapters.iter().map(|c| c.timestamp).collect();
    assert_eq!(stamps, vec![0, 7 * 60_000, 20 * 60_000]);

    assert_eq!(ctx.cuts.len(), 1);
    assert_eq!(ctx.cuts[0].chunk, 1);
    assert_eq!(ctx.cuts[0].pad, 1000);

    assert_eq!(
        report::chapters(&ctx),
        "- 00:00:00 - Intro\n- 00:07:00 - Coding\n- 00:20:00 - Raid\n"
    );
    assert_eq!(report::total_duration(&ctx), 21 * 60_000);
}

// =============================================================================
// Test 2: Included files share the stack and append chunks in textual order
// =============================================================================

#[test]
fn include_shares_state_in_encounter_order() {
    let dir = tempfile::tempdir().unwrap();
    let inner = write(dir.path(), "inner.markut", "10 20 chunk\n30\n");
    let outer = write(
        dir.path(),
        "outer.markut",
        &format!(
            "\"in.mp4\" input\n0 10 chunk\n\"{}\" include\n40 chunk\n",
            inner.display()
        ),
    );

    let ctx = Evaluator::eval_files::<PathBuf>(None, &[outer]).unwrap();
    let bounds: Vec<(i64, i64)> = ctx.chunks.iter().map(|c| (c.start, c.end)).collect();
    assert_eq!(bounds, vec![(0, 10_000), (10_000, 20_000), (30_000, 40_000)]);
    assert_eq!(ctx.chunks[1].loc.file_path.as_ref(), inner.display().to_string());
    assert_eq!(ctx.chunks[1].input_path, "in.mp4");
}

#[test]
fn include_cycle_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.markut");
    let b = dir.path().join("b.markut");
    fs::write(&a, format!("\"{}\" include\n", b.display())).unwrap();
    fs::write(&b, format!("\"{}\" include\n", a.display())).unwrap();

    let err = Evaluator::eval_files::<PathBuf>(None, &[a]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncludeCycle);
}

#[test]
fn self_include_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("self.markut");
    fs::write(&a, format!("\"{}\" include_if_exists\n", a.display())).unwrap();

    let err = Evaluator::eval_files::<PathBuf>(None, &[a]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncludeCycle);
}

#[test]
fn same_file_may_be_included_twice_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let part = write(dir.path(), "part.markut", "0 1 chunk\n");
    let main = write(
        dir.path(),
        "main.markut",
        &format!("\"{0}\" include \"{0}\" include\n", part.display()),
    );
    let ctx = Evaluator::eval_files::<PathBuf>(None, &[main]).unwrap();
    assert_eq!(ctx.chunks.len(), 2);
}

#[test]
fn include_depth_is_limited() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<PathBuf> = (0..=MAX_INCLUDE_DEPTH)
        .map(|i| dir.path().join(format!("level-{i:02}.markut")))
        .collect();
    for pair in files.windows(2) {
        fs::write(&pair[0], format!("\"{}\" include\n", pair[1].display())).unwrap();
    }
    fs::write(&files[MAX_INCLUDE_DEPTH], "0 1 chunk\n").unwrap();

    let err = Evaluator::eval_files(None, &files[..1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncludeCycle);
    assert!(err.to_string().contains("include depth limit of 64 exceeded"), "{err}");

    // One level shallower evaluates fine.
    let ctx = Evaluator::eval_files(None, &files[1..2]).unwrap();
    assert_eq!(ctx.chunks.len(), 1);
}

// =============================================================================
// Test 3: User config is evaluated first and multiple files share a context
// =============================================================================

#[test]
fn user_config_and_multiple_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "config.markut", "\"libx265\" video_codec \"-an\" outf\n");
    let first = write(dir.path(), "first.markut", "\"a.mp4\" input 0 10 chunk\n");
    let second = write(dir.path(), "second.markut", "\"b.mp4\" input 5 15 chunk\n");

    let ctx = Evaluator::eval_files(Some(config.as_path()), &[first, second]).unwrap();
    assert_eq!(ctx.chunks[0].input_path, "a.mp4");
    assert_eq!(ctx.chunks[1].input_path, "b.mp4");

    let params = EncodeParams::from_context(&ctx);
    assert_eq!(params.video_codec, "libx265");
    assert_eq!(params.extra_outflags, vec!["-an"]);
}

#[test]
fn missing_user_config_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let first = write(dir.path(), "first.markut", "0 10 chunk\n");
    let missing = dir.path().join("nope.markut");
    let ctx = Evaluator::eval_files(Some(missing.as_path()), &[first]).unwrap();
    assert_eq!(ctx.chunks.len(), 1);
}

#[test]
fn missing_markut_file_is_io_error() {
    let err = Evaluator::eval_files::<&str>(None, &["/nonexistent/markut/file.markut"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

// =============================================================================
// Test 4: Diagnostics point at the right file and position
// =============================================================================

#[test]
fn errors_in_included_files_are_located_there() {
    let dir = tempfile::tempdir().unwrap();
    let inner = write(dir.path(), "inner.markut", "\n  20 10 chunk\n");
    let outer = write(
        dir.path(),
        "outer.markut",
        &format!("\"{}\" include\n", inner.display()),
    );

    let err = Evaluator::eval_files::<PathBuf>(None, &[outer]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    let rendered = err.to_string();
    let inner_name = inner.display().to_string();
    assert!(rendered.starts_with(&format!("{inner_name}:2:6: ERROR:")), "{rendered}");
    assert!(rendered.contains(&format!("{inner_name}:2:3: NOTE: the start is located here")));
}

#[test]
fn residual_items_across_files_are_all_reported() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.markut", "1\n");
    let b = write(dir.path(), "b.markut", "\"orphan\" 2 chapter\n");
    let err = Evaluator::eval_files(None, &[a, b]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Residual);
    assert_eq!(err.diagnostics().len(), 2);
}

// =============================================================================
// Test 5: Render plans use the evaluated context without running ffmpeg
// =============================================================================

#[test]
fn render_plan_for_chunks() {
    let ctx = Evaluator::eval_source(
        "\"in.mp4\" input \"copy\" video_codec 1:00 1:30 chunk 2:00 2:10 chunk blur",
        "plan.markut",
    )
    .unwrap();
    let ffmpeg = Ffmpeg::new("ffmpeg", false);
    let renderer = Renderer::new(&ctx, ffmpeg.clone(), "cache");
    let params = EncodeParams::from_context(&ctx);

    let paths: Vec<PathBuf> = ctx.chunks.iter().map(|c| renderer.chunk_path(c)).collect();
    assert_eq!(paths[0], Path::new("cache").join("in.mp4-000060000-000090000.mp4"));
    assert_eq!(paths[1], Path::new("cache").join("in.mp4-000120000-000130000-blur.mp4"));

    let args = ffmpeg.chunk_args(&ctx.chunks[0], &params, &paths[0]);
    assert_eq!(&args[..2], &["-ss", "60.000"]);
    assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
    assert!(args.windows(2).any(|w| w == ["-t", "30.000"]));
    assert!(!args.iter().any(|a| a == "-vf"));
}
