use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mapsweep", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the map figure sweep and its WEBP animations (requires `ffmpeg` on PATH).
    Sweep(SweepArgs),
    /// Compose old-vs-new comparison grids from previously rendered sweeps.
    Compare(CompareArgs),
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Working root that holds inputs and receives outputs.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// JSON file overriding the built-in parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging, including output from ffmpeg and optipng.
    #[arg(long)]
    debug: bool,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Which rendering pipeline to sweep.
    #[arg(long, value_enum, default_value_t = PipelineChoice::New)]
    pipeline: PipelineChoice,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PipelineChoice {
    Old,
    New,
}

impl From<PipelineChoice> for mapsweep::Pipeline {
    fn from(choice: PipelineChoice) -> Self {
        match choice {
            PipelineChoice::Old => Self::Old,
            PipelineChoice::New => Self::New,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let debug = match &cli.cmd {
        Command::Sweep(args) => args.common.debug,
        Command::Compare(args) => args.common.debug,
    };
    init_tracing(debug)?;

    match cli.cmd {
        Command::Sweep(args) => cmd_sweep(args),
        Command::Compare(args) => cmd_compare(args),
    }
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if debug { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("install tracing subscriber")?;
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let cfg = match &args.common.config {
        Some(path) => mapsweep::SweepConfig::from_path(path)?,
        None => mapsweep::SweepConfig::default(),
    };
    cfg.validate()?;

    let mut text = mapsweep::engine_for(&cfg.font).context("set up text rendering")?;
    let report = mapsweep::run_sweep(
        &cfg,
        args.pipeline.into(),
        &args.common.root,
        &mut text,
        args.common.debug,
    )
    .context("run sweep")?;

    tracing::info!(
        rendered = report.rendered.len(),
        animated = report.animated.len(),
        skipped = report.skipped.len(),
        "sweep finished"
    );
    Ok(())
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let cfg = match &args.common.config {
        Some(path) => mapsweep::CompareConfig::from_path(path)?,
        None => mapsweep::CompareConfig::default(),
    };
    cfg.validate()?;

    let mut text = mapsweep::engine_for(&cfg.font).context("set up text rendering")?;
    let report = mapsweep::run_compare(&cfg, &args.common.root, &mut text, args.common.debug)
        .context("run comparison")?;

    tracing::info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "comparison finished"
    );
    Ok(())
}
