//! OPAL Algorithm Runner CLI.
//!
//! Usage:
//!     opal-runner run --data-dir ./subjects --workers 4 --algorithm snippet.py --entry-name MyAlgorithm

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "opal-runner", about = "Distributed map/aggregate harness for OPAL algorithms")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an algorithm over every subject file in a data directory.
    Run(commands::run::RunArgs),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    opal_logging::init_logging(opal_logging::LogConfig {
        app_name: "opal-runner",
        verbose: args.verbose,
    })?;

    match args.command {
        Command::Run(run_args) => commands::run::execute(run_args),
    }
}
