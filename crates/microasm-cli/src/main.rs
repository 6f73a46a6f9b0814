use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::disasm::DisasmCommand;
use commands::example::ExampleCommand;
use commands::run::{Outcome, RunCommand};

#[derive(Parser)]
#[command(name = "masm-host", version, about = "Host driver for the MicroASM interpreter")]
struct Cli {
    /// Path to masm.toml (searched in the current directory and parents by default)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an interpreter, run a bytecode file and inspect the result
    Run(RunCommand),
    /// Print the decoded contents of a bytecode file
    Disasm(DisasmCommand),
    /// Write a demo bytecode file
    Example(ExampleCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = config::load_config(cli.config.as_deref())?;

    let debug = match &cli.command {
        Commands::Run(cmd) => cmd.debug || config.interpreter.debug,
        _ => false,
    };
    init_tracing(debug)?;

    match cli.command {
        Commands::Run(cmd) => match cmd.run(&config)? {
            Outcome::Completed => Ok(ExitCode::SUCCESS),
            Outcome::SetupFailed => Ok(ExitCode::FAILURE),
        },
        Commands::Disasm(cmd) => cmd.run().map(|()| ExitCode::SUCCESS),
        Commands::Example(cmd) => cmd.run().map(|()| ExitCode::SUCCESS),
    }
}

/// `RUST_LOG` wins; otherwise warnings, plus the instruction trace in debug mode
fn init_tracing(debug: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if debug => {
            EnvFilter::new("warn,microasm_vm=debug,microasm_capi=debug,microasm_host=debug")
        }
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))
}
