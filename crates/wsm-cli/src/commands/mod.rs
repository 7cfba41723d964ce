mod config;
mod flights;
mod plan;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use wsm_config::{WsmConfig, load_config};

use self::flights::FlightsCommand;
use self::plan::PlanArgs;
use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the flight a resource operation would run
    Plan(PlanArgs),
    /// Inspect persisted flights
    Flights {
        /// Flight store directory (default: [flight_store] directory from the config)
        #[arg(long, global = true)]
        store: Option<PathBuf>,

        #[command(subcommand)]
        command: FlightsCommand,
    },
    /// Print the effective configuration
    Config,
}

impl Commands {
    pub(crate) fn execute(self, config_path: &Path) -> Result<()> {
        let config = load(config_path)?;
        match self {
            Self::Plan(args) => plan::run(&args, &config),
            Self::Flights { store, command } => flights::run(command, store, &config),
            Self::Config => {
                print!("{}", config::render(&config));
                Ok(())
            }
        }
    }
}

fn load(path: &Path) -> Result<WsmConfig> {
    let config = load_config(path)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}
