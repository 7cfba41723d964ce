use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Subcommand;
use wsm_config::WsmConfig;
use wsm_flight::{Direction, FileSystemFlightStore, FlightId, FlightState, FlightStore};

use crate::error::{CliError, Result};

#[derive(Subcommand)]
pub(crate) enum FlightsCommand {
    /// List stored flights, oldest update first
    List,
    /// Show one stored flight
    Show {
        /// Flight id
        id: String,
    },
}

pub(crate) fn run(
    command: FlightsCommand,
    store: Option<PathBuf>,
    config: &WsmConfig,
) -> Result<()> {
    let directory = store
        .or_else(|| config.flight_store().directory().map(PathBuf::from))
        .ok_or(CliError::NoFlightStore)?;
    let store = FileSystemFlightStore::new(directory);
    tracing::debug!(directory = %store.directory().display(), "opened flight store");

    match command {
        FlightsCommand::List => {
            print!("{}", render_list(&store.list()?));
            Ok(())
        }
        FlightsCommand::Show { id } => {
            let flight_id: FlightId = id
                .parse()
                .map_err(|source| CliError::InvalidFlightId { id, source })?;
            let state = store
                .load(flight_id)?
                .ok_or(CliError::FlightNotFound(flight_id))?;
            print!("{}", render_state(&state)?);
            Ok(())
        }
    }
}

fn render_list(states: &[FlightState]) -> String {
    if states.is_empty() {
        return "No stored flights.\n".to_string();
    }

    let mut out = String::new();
    for state in states {
        let _ = writeln!(
            out,
            "{}  {:<12} {:<14} {}  {}",
            state.flight_id,
            state.status.as_str(),
            state.role.as_str(),
            state.flight_name,
            state.updated_at.format("%Y-%m-%dT%H:%M:%SZ"),
        );
    }
    out
}

fn render_state(state: &FlightState) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "flight:  {}", state.flight_id);
    let _ = writeln!(out, "name:    {}", state.flight_name);
    let _ = writeln!(out, "role:    {}", state.role);
    let _ = writeln!(out, "status:  {}", state.status);
    let _ = writeln!(out, "updated: {}", state.updated_at.to_rfc3339());

    out.push_str("steps:\n");
    for (index, name) in state.step_names.iter().enumerate() {
        let _ = writeln!(out, "  {} {name}", position_marker(state, index));
    }

    if let Some(step) = &state.failed_step {
        let _ = writeln!(out, "failed step: {step}");
    }
    if let Some(failure) = &state.failure {
        let _ = writeln!(out, "failure: {failure}");
    }
    if let Some(map) = &state.working_map {
        let _ = writeln!(out, "working map:\n{}", serde_json::to_string_pretty(map)?);
    }
    Ok(out)
}

/// `+` done, `>` next to run, `<` next to undo, `-` undone or never run.
fn position_marker(state: &FlightState, index: usize) -> char {
    if state.status.is_terminal() {
        return ' ';
    }
    match state.direction {
        Direction::Do if index < state.next_step => '+',
        Direction::Do if index == state.next_step => '>',
        Direction::Undo if index + 1 < state.next_step => '+',
        Direction::Undo if index + 1 == state.next_step => '<',
        _ => '-',
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wsm_flight::{FlightRole, FlightStatus};

    use super::*;

    fn state(status: FlightStatus, direction: Direction, next_step: usize) -> FlightState {
        FlightState {
            flight_id: FlightId::new(),
            flight_name: "create-gcs-bucket".to_string(),
            role: FlightRole::Create,
            status,
            direction,
            next_step,
            step_names: vec![
                "store_resource_metadata".to_string(),
                "get_gcp_cloud_context".to_string(),
                "create_gcs_bucket".to_string(),
            ],
            failed_step: None,
            failure: None,
            working_map: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn interrupted_flight_marks_next_step() -> anyhow::Result<()> {
        let out = render_state(&state(FlightStatus::Interrupted, Direction::Do, 1))?;

        assert!(out.contains("  + store_resource_metadata"));
        assert!(out.contains("  > get_gcp_cloud_context"));
        assert!(out.contains("  - create_gcs_bucket"));
        Ok(())
    }

    #[test]
    fn undoing_flight_marks_next_undo() -> anyhow::Result<()> {
        let out = render_state(&state(FlightStatus::Running, Direction::Undo, 2))?;

        assert!(out.contains("  + store_resource_metadata"));
        assert!(out.contains("  < get_gcp_cloud_context"));
        Ok(())
    }

    #[test]
    fn failed_flight_shows_failure() -> anyhow::Result<()> {
        let mut failed = state(FlightStatus::Failed, Direction::Undo, 0);
        failed.failed_step = Some("create_gcs_bucket".to_string());
        failed.failure = Some("duplicate resource: bucket taken".to_string());

        let out = render_state(&failed)?;

        assert!(out.contains("status:  failed"));
        assert!(out.contains("failed step: create_gcs_bucket"));
        assert!(out.contains("failure: duplicate resource: bucket taken"));
        assert!(!out.contains("working map"));
        Ok(())
    }

    #[test]
    fn empty_list() {
        assert_eq!(render_list(&[]), "No stored flights.\n");
    }
}
