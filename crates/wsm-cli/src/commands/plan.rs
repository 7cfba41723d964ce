use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use serde::de::DeserializeOwned;
use wsm_config::WsmConfig;
use wsm_core::ControlledResource;
use wsm_flight::FlightRole;
use wsm_operations::types::FlightInputs;
use wsm_operations::{FlightFactory, OperationSettings, ResourceFlight};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Operation {
    Create,
    Delete,
    Update,
    Clone,
    RevokeAccess,
    RestoreAccess,
}

impl From<Operation> for FlightRole {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Create => Self::Create,
            Operation::Delete => Self::Delete,
            Operation::Update => Self::Update,
            Operation::Clone => Self::Clone,
            Operation::RevokeAccess => Self::RevokeAccess,
            Operation::RestoreAccess => Self::RestoreAccess,
        }
    }
}

#[derive(Args)]
pub(crate) struct PlanArgs {
    /// TOML file describing the controlled resource
    #[arg(long, short = 'r')]
    resource: PathBuf,

    /// Operation to plan
    #[arg(long, short = 'o', value_enum, default_value = "create")]
    operation: Operation,

    /// TOML file with flight inputs (user, creation, update or clone parameters)
    #[arg(long, short = 'i')]
    inputs: Option<PathBuf>,
}

pub(crate) fn run(args: &PlanArgs, config: &WsmConfig) -> Result<()> {
    let resource: ControlledResource = read_toml(&args.resource)?;
    let inputs: FlightInputs = match &args.inputs {
        Some(path) => read_toml(path)?,
        None => FlightInputs::default(),
    };

    let factory = FlightFactory::standard(OperationSettings::from_config(config));
    let flight = factory.flight(args.operation.into(), &resource, &inputs)?;

    print!("{}", render(&flight));
    Ok(())
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn render(flight: &ResourceFlight) -> String {
    let mut out = format!("{} ({})\n", flight.name(), flight.role());
    if flight.is_empty() {
        out.push_str("  no steps\n");
        return out;
    }

    let width = flight
        .step_names()
        .iter()
        .map(|name| name.len())
        .max()
        .unwrap_or_default();
    for (index, step) in flight.steps().iter().enumerate() {
        let _ = write!(
            out,
            "  {:>2}. {:<width$}  retry={}",
            index + 1,
            step.name(),
            step.policy().name()
        );
        if !step.step().reversible() {
            out.push_str("  irreversible");
        }
        out.push('\n');
    }
    out
}
