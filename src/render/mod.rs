//! Rendering: turns an evaluated [`EvalContext`] into ffmpeg invocations.
//!
//! Chunks are rendered into a cache directory under names derived from their
//! identity, so re-running an edit only renders chunks that changed.

pub mod subtitles;

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{info, warn};

use crate::chunk::{Chunk, Cut};
use crate::config::Settings;
use crate::dsl::timestamp::millis_to_secs_arg;
use crate::dsl::EvalContext;

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_VIDEO_BITRATE: &str = "4000k";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_AUDIO_BITRATE: &str = "300k";
pub const BLUR_FILTER: &str = "boxblur=50:5";
pub const FINAL_LIST_PATH: &str = "final-list.txt";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
    #[error("no input file is provided, use the `input` command in the markut file")]
    NoInput,
    #[error("{index} is an invalid chunk number, there are only {count} of them")]
    InvalidChunk { index: usize, count: usize },
    #[error("cut {index} needs a chunk after it, but there are only {count} chunks")]
    InvalidCut { index: usize, count: usize },
}

/// Transcoding parameters for chunk renders, with unset values replaced by defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    pub video_codec: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub extra_inflags: Vec<String>,
    pub extra_outflags: Vec<String>,
}

impl EncodeParams {
    pub fn from_context(context: &EvalContext) -> Self {
        let pick = |token: &Option<crate::dsl::Token>, default: &str| {
            token
                .as_ref()
                .map(|t| t.text.clone())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            video_codec: pick(&context.video_codec, DEFAULT_VIDEO_CODEC),
            video_bitrate: pick(&context.video_bitrate, DEFAULT_VIDEO_BITRATE),
            audio_codec: pick(&context.audio_codec, DEFAULT_AUDIO_CODEC),
            audio_bitrate: pick(&context.audio_bitrate, DEFAULT_AUDIO_BITRATE),
            extra_inflags: context.extra_inflags.clone(),
            extra_outflags: context.extra_outflags.clone(),
        }
    }
}

/// Builds and runs ffmpeg command lines.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub binary: PathBuf,
    /// Pass `-y` so existing outputs are overwritten without prompting.
    pub overwrite: bool,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            binary: binary.into(),
            overwrite,
        }
    }

    /// `$FFMPEG_PREFIX/bin/ffmpeg`, else the settings prefix, else `ffmpeg` from `PATH`.
    pub fn from_settings(settings: &Settings, overwrite: bool) -> Self {
        let prefix = std::env::var("FFMPEG_PREFIX")
            .ok()
            .or_else(|| settings.ffmpeg_prefix.clone());
        let binary = match prefix {
            Some(prefix) => Path::new(&prefix).join("bin").join("ffmpeg"),
            None => PathBuf::from("ffmpeg"),
        };
        Self::new(binary, overwrite || settings.overwrite)
    }

    fn base_args(&self) -> Vec<String> {
        if self.overwrite {
            vec!["-y".to_string()]
        } else {
            Vec::new()
        }
    }

    pub fn chunk_args(&self, chunk: &Chunk, params: &EncodeParams, output: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["-ss".to_string(), millis_to_secs_arg(chunk.start)]);
        args.extend(params.extra_inflags.iter().cloned());
        args.extend(["-i".to_string(), chunk.input_path.clone()]);
        args.extend(["-c:v".to_string(), params.video_codec.clone()]);
        args.extend(["-b:v".to_string(), params.video_bitrate.clone()]);
        args.extend(["-c:a".to_string(), params.audio_codec.clone()]);
        args.extend(["-b:a".to_string(), params.audio_bitrate.clone()]);
        if chunk.blur {
            args.extend(["-vf".to_string(), BLUR_FILTER.to_string()]);
        }
        args.extend(["-t".to_string(), millis_to_secs_arg(chunk.duration())]);
        args.extend(params.extra_outflags.iter().cloned());
        args.push(output.display().to_string());
        args
    }

    pub fn concat_args(&self, list: &Path, output: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(
            ["-f", "concat", "-safe", "0", "-i"]
                .into_iter()
                .map(String::from),
        );
        args.push(list.display().to_string());
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(output.display().to_string());
        args
    }

    /// Remux a raw recording into MPEG-TS so it can be seeked and cut reliably.
    pub fn fixup_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["-i".to_string(), input.display().to_string()]);
        args.extend(
            ["-codec", "copy", "-bsf:v", "h264_mp4toannexb"]
                .into_iter()
                .map(String::from),
        );
        args.push(output.display().to_string());
        args
    }

    /// The command line as it would be typed into a shell, for logging.
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(args.iter().cloned())
            .map(|arg| {
                if arg.contains(' ') {
                    format!("\"{arg}\"")
                } else {
                    arg
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self, args: &[String]) -> Result<(), RenderError> {
        let command = self.command_line(args);
        info!("[CMD] {command}");
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| RenderError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(RenderError::Failed { command, status });
        }
        Ok(())
    }
}

/// Write an ffmpeg concat demuxer list.
pub fn write_concat_list(paths: &[PathBuf], list: &Path) -> Result<(), RenderError> {
    let content: String = paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    write_file(list, &content)
}

fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    std::fs::write(path, content).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Renders chunks, cuts and the final video of one evaluated context.
pub struct Renderer<'a> {
    context: &'a EvalContext,
    ffmpeg: Ffmpeg,
    params: EncodeParams,
    cache_dir: PathBuf,
}

impl<'a> Renderer<'a> {
    pub fn new(context: &'a EvalContext, ffmpeg: Ffmpeg, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            context,
            params: EncodeParams::from_context(context),
            ffmpeg,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn chunk_path(&self, chunk: &Chunk) -> PathBuf {
        self.cache_dir.join(chunk.name())
    }

    fn ensure_cache_dir(&self) -> Result<(), RenderError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| RenderError::Io {
            path: self.cache_dir.display().to_string(),
            source,
        })
    }

    fn require_input(&self) -> Result<(), RenderError> {
        if self.context.input_path.is_empty() {
            return Err(RenderError::NoInput);
        }
        Ok(())
    }

    /// Render one chunk unless its artifact already exists. Returns the artifact path.
    pub fn render_chunk(&self, chunk: &Chunk) -> Result<PathBuf, RenderError> {
        let output = self.chunk_path(chunk);
        if output.exists() {
            info!("{} is already rendered, skipping", output.display());
            return Ok(output);
        }
        self.ensure_cache_dir()?;

        // ffmpeg picks the container from the extension, so keep it on the temporary file.
        let partial = self.cache_dir.join(format!("partial-{}", chunk.name()));
        let args = self.ffmpeg.chunk_args(chunk, &self.params, &partial);
        if let Err(e) = self.ffmpeg.run(&args) {
            // Never leave a partial artifact behind.
            if partial.exists() {
                if let Err(remove) = std::fs::remove_file(&partial) {
                    warn!("could not remove {}: {remove}", partial.display());
                }
            }
            return Err(e);
        }
        std::fs::rename(&partial, &output).map_err(|source| RenderError::Io {
            path: output.display().to_string(),
            source,
        })?;

        if !chunk.chat_log.is_empty() {
            let srt = subtitles::chunks_to_srt(std::slice::from_ref(chunk));
            write_file(&output.with_extension("srt"), &srt)?;
        }
        Ok(output)
    }

    pub fn render_chunk_by_index(&self, index: usize) -> Result<PathBuf, RenderError> {
        self.require_input()?;
        let chunk = self
            .context
            .chunks
            .get(index)
            .ok_or(RenderError::InvalidChunk {
                index,
                count: self.context.chunks.len(),
            })?;
        self.render_chunk(chunk)
    }

    /// Render every chunk and concatenate them into the output path.
    pub fn render_final(&self) -> Result<PathBuf, RenderError> {
        self.require_input()?;
        let mut paths = Vec::with_capacity(self.context.chunks.len());
        for chunk in &self.context.chunks {
            paths.push(self.render_chunk(chunk)?);
        }

        let list = PathBuf::from(FINAL_LIST_PATH);
        write_concat_list(&paths, &list)?;
        let output = PathBuf::from(&self.context.output_path);
        self.ffmpeg.run(&self.ffmpeg.concat_args(&list, &output))?;

        let srt = subtitles::chunks_to_srt(&self.context.chunks);
        if !srt.is_empty() {
            write_file(&output.with_extension("srt"), &srt)?;
        }
        Ok(output)
    }

    /// The two padded halves of a cut: the tail of its chunk and the head of the next one.
    pub fn cut_chunks(&self, cut: &Cut) -> Result<[Chunk; 2], RenderError> {
        let count = self.context.chunks.len();
        let invalid = RenderError::InvalidCut {
            index: cut.chunk,
            count,
        };
        if cut.chunk + 1 >= count {
            return Err(invalid);
        }
        let left = &self.context.chunks[cut.chunk];
        let right = &self.context.chunks[cut.chunk + 1];

        let mut tail = left.clone();
        tail.start = (left.end - cut.pad).max(left.start);
        tail.chat_log.retain(|g| g.offset >= tail.start);
        let mut head = right.clone();
        head.end = right.start.saturating_add(cut.pad).min(right.end);
        head.chat_log.retain(|g| g.offset <= head.end);
        Ok([tail, head])
    }

    /// Render cut number `index` into `cut-NN.mp4`.
    pub fn render_cut(&self, index: usize) -> Result<PathBuf, RenderError> {
        self.require_input()?;
        let cut = self
            .context
            .cuts
            .get(index)
            .ok_or(RenderError::InvalidCut {
                index,
                count: self.context.cuts.len(),
            })?;
        let halves = self.cut_chunks(cut)?;
        let mut paths = Vec::with_capacity(2);
        for half in &halves {
            paths.push(self.render_chunk(half)?);
        }

        let list = PathBuf::from(format!("cut-{:02}-list.txt", cut.chunk));
        write_concat_list(&paths, &list)?;
        let output = PathBuf::from(format!("cut-{:02}.mp4", cut.chunk));
        self.ffmpeg.run(&self.ffmpeg.concat_args(&list, &output))?;
        Ok(output)
    }
}
