//! ELUDO CLI - Command-line match driver
//!
//! Commands:
//! - play: run a single race and log every engine event
//! - simulate: run many races and report per-faction statistics

use clap::{Parser, Subcommand};

mod match_cmd;

#[derive(Parser)]
#[command(name = "eludo")]
#[command(about = "ELUDO four-faction dice race")]
struct Cli {
    /// RNG seed for reproducible dice and contests
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single race and log every event
    Play(match_cmd::PlayArgs),
    /// Play many races and report per-faction statistics
    Simulate(match_cmd::SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => match_cmd::run_play(args, cli.seed),
        Commands::Simulate(args) => match_cmd::run_simulate(args, cli.seed),
    }
}
