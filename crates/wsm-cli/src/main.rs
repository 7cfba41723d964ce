mod commands;
mod error;

use std::io::stderr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wsm_config::DEFAULT_CONFIG_FILE;

use crate::commands::Commands;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "wsm")]
#[command(version = env!("WSM_VERSION"))]
#[command(about = "Plan and inspect workspace manager flights", long_about = None)]
struct Cli {
    /// Config file (default: ./wsm.toml, built-in defaults if absent)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = cli.command.execute(&cli.config) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .init();
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
