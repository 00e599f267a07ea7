//! tilevm CLI - run and benchmark the tile pipeline from the command line.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::bench::BenchArgs;
use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "tilevm")]
#[command(version = tilevm::VERSION)]
#[command(about = "Tile-parallel image filtering through sandboxed WebAssembly guests", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.tilevm/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    /// Also write log lines to stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process every PNG in the input directory
    Run(RunArgs),

    /// Time the exchange strategies against each other on one image
    Bench(BenchArgs),

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { action } => commands::config::run(action, cli.config.as_deref()),
        Commands::Run(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.debug, cli.verbose)?;
            runner.log_startup("run");
            commands::run::run(&runner, args)
        }
        Commands::Bench(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.debug, cli.verbose)?;
            runner.log_startup("bench");
            commands::bench::run(&runner, args)
        }
    }
}
