//! Markut CLI: evaluates markut files and drives ffmpeg.
//!
//! # Commands
//!
//! - `markut final` - Render the final video
//! - `markut chunk` - Render a specific chunk of the final video
//! - `markut cut` - Render a specific cut of the final video
//! - `markut chapters` - Print YouTube chapters
//! - `markut summary` - Print chunks, cuts and chapters
//! - `markut fixup` - Remux the initial footage so it can be cut
//! - `markut funcs` - List every markut command

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use markut::config::{self, Settings};
use markut::dsl::{Command, EvalContext, Evaluator};
use markut::render::{Ffmpeg, Renderer};
use markut::report;

#[derive(Parser)]
#[command(name = "markut")]
#[command(about = "Slice, concatenate and annotate stream VODs with a tiny stack language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EvalArgs {
    /// Markut files to evaluate, in order, into one context
    #[arg(long = "markut", required = true)]
    markut: Vec<PathBuf>,

    /// Do not evaluate ~/.markut/config.markut first
    #[arg(long)]
    no_user_config: bool,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    eval: EvalArgs,

    /// Pass -y to ffmpeg
    #[arg(short = 'y')]
    overwrite: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the final video
    Final(RenderArgs),

    /// Render a specific chunk of the final video
    Chunk {
        #[command(flatten)]
        render: RenderArgs,

        /// Chunk number to render
        #[arg(long, default_value_t = 0)]
        chunk: usize,
    },

    /// Render a specific cut of the final video
    Cut {
        #[command(flatten)]
        render: RenderArgs,

        /// Cut number to render
        #[arg(long, default_value_t = 0)]
        cut: usize,
    },

    /// Print YouTube chapters
    Chapters(EvalArgs),

    /// Print chunks, cuts and chapters
    Summary(EvalArgs),

    /// Remux the initial footage so it can be cut reliably
    Fixup {
        /// Path to the input video file
        #[arg(long)]
        input: PathBuf,

        /// Path to the output video file
        #[arg(long, default_value = "input.ts")]
        output: PathBuf,

        /// Pass -y to ffmpeg
        #[arg(short = 'y')]
        overwrite: bool,
    },

    /// List every markut command
    Funcs,
}

fn evaluate(args: &EvalArgs) -> Result<EvalContext> {
    let user_config = if args.no_user_config {
        None
    } else {
        config::user_config_path()
    };
    Ok(Evaluator::eval_files(user_config.as_deref(), args.markut.as_slice())?)
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;

    match cli.command {
        Commands::Final(args) => {
            let context = evaluate(&args.eval)?;
            let ffmpeg = Ffmpeg::from_settings(&settings, args.overwrite);
            let renderer = Renderer::new(&context, ffmpeg, &settings.cache_dir);
            let output = renderer.render_final()?;
            print!("{}", report::summary(&context));
            println!("Generated {}", output.display());
        }
        Commands::Chunk { render, chunk } => {
            let context = evaluate(&render.eval)?;
            let ffmpeg = Ffmpeg::from_settings(&settings, render.overwrite);
            let renderer = Renderer::new(&context, ffmpeg, &settings.cache_dir);
            let output = renderer.render_chunk_by_index(chunk)?;
            println!("{} is rendered!", output.display());
        }
        Commands::Cut { render, cut } => {
            let context = evaluate(&render.eval)?;
            let ffmpeg = Ffmpeg::from_settings(&settings, render.overwrite);
            let renderer = Renderer::new(&context, ffmpeg, &settings.cache_dir);
            let output = renderer.render_cut(cut)?;
            println!("Generated {}", output.display());
            if let Some(c) = context.cuts.get(cut) {
                println!("{}: NOTE: cut is defined in here", context.chunks[c.chunk].loc);
            }
        }
        Commands::Chapters(args) => {
            let context = evaluate(&args)?;
            print!("{}", report::chapters(&context));
        }
        Commands::Summary(args) => {
            let context = evaluate(&args)?;
            print!("{}", report::summary(&context));
        }
        Commands::Fixup {
            input,
            output,
            overwrite,
        } => {
            let ffmpeg = Ffmpeg::from_settings(&settings, overwrite);
            ffmpeg.run(&ffmpeg.fixup_args(&input, &output))?;
            println!("Generated {}", output.display());
        }
        Commands::Funcs => {
            for command in Command::ALL {
                println!(
                    "{:<18} {:<14} {:<40} {}",
                    command.name(),
                    command.category().to_string(),
                    command.signature(),
                    command.description()
                );
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
