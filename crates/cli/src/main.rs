//! `requeue`: post-process saved queue snapshots.
//!
//! Two subcommands over the same snapshot format: `reframe` rewrites the
//! frame length and frame-bearing filename prefixes, `reseed` reassigns
//! sampler seeds. Both load one JSON document, hand it to `requeue-core`,
//! and write the transformed document whole.

mod files;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use requeue_core::reframe::{self, DEFAULT_FRAMES};
use requeue_core::reseed::{self, ReseedMode, ReseedOptions, SeedScope};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite the frame length and filename prefixes in a saved queue
    Reframe(ReframeArgs),
    /// Reassign sampler seeds in a saved queue
    Reseed(ReseedArgs),
}

#[derive(Args)]
struct ReframeArgs {
    /// Path to the saved queue JSON
    #[arg(long)]
    file: PathBuf,

    /// Target frame length
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    frames: i64,

    /// Explicit output path (defaults to `<stem>.frames{N}.json`)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct ReseedArgs {
    /// Path to the input queue JSON
    #[arg(long = "in")]
    input: PathBuf,

    /// Where to write the reseeded JSON
    #[arg(long)]
    out: PathBuf,

    /// Reseed mode: random or increment
    #[arg(long)]
    mode: String,

    /// Starting seed for increment mode
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Step between seeds for increment mode
    #[arg(long, default_value_t = 1)]
    step: i64,

    /// Increment counting scope: global counts across the whole queue,
    /// job restarts per job
    #[arg(long, default_value = "global")]
    scope: String,

    /// PRNG seed for reproducible random mode
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Only reseed these sections (default: queue_running queue_pending)
    #[arg(long, num_args = 1..)]
    sections: Option<Vec<String>>,

    /// Parse and report without writing
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "requeue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Commands::Reframe(args) => run_reframe(args),
        Commands::Reseed(args) => run_reseed(args),
    }
}

fn run_reframe(args: ReframeArgs) -> anyhow::Result<()> {
    let mut doc = files::load_document(&args.file)?;
    let summary = reframe::reframe_document(&mut doc, args.frames);
    tracing::info!(
        frames = args.frames,
        graph_nodes = summary.graph_nodes_updated,
        ui_nodes = summary.ui_nodes_updated,
        "Reframed queue snapshot",
    );

    let out = args
        .out
        .unwrap_or_else(|| files::reframe_output_path(&args.file, args.frames));
    files::write_document(&out, &doc)?;
    println!("Wrote: {}", out.display());
    Ok(())
}

fn run_reseed(args: ReseedArgs) -> anyhow::Result<()> {
    // Mode and scope are validated before the input is read.
    let mode: ReseedMode = args.mode.parse()?;
    let scope: SeedScope = args.scope.parse()?;

    let mut options = ReseedOptions::new(mode);
    options.start = args.start;
    options.step = args.step;
    options.scope = scope;
    options.rng_seed = args.rng_seed;
    if let Some(sections) = args.sections {
        options.sections = sections;
    }

    let mut doc = files::load_document(&args.input)?;
    let summary = reseed::reseed_document(&mut doc, &options);
    println!(
        "Nodes touched: {}, seed fields changed: {}",
        summary.nodes_touched, summary.seeds_changed
    );

    if args.dry_run {
        println!("Dry run; no file written.");
    } else {
        files::write_document(&args.out, &doc)?;
        println!("Wrote: {}", args.out.display());
    }
    Ok(())
}
