use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::id::FlightId;
use crate::roles::FlightRole;

/// Lifecycle status of a persisted flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Running,
    Interrupted,
    Succeeded,
    /// Failed, and every completed step was undone.
    Failed,
    /// Failed, and at least one undo also failed.
    UndoFailed,
}

impl FlightStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::UndoFailed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::UndoFailed => "undo-failed",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way the executor is walking the step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Do,
    Undo,
}

/// Persisted position and working map of one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightState {
    pub flight_id: FlightId,
    pub flight_name: String,
    pub role: FlightRole,
    pub status: FlightStatus,
    pub direction: Direction,
    /// Doing: index of the next step to run. Undoing: number of completed
    /// steps still waiting to be undone.
    pub next_step: usize,
    pub step_names: Vec<String>,
    pub failed_step: Option<String>,
    pub failure: Option<String>,
    /// Discarded once the flight reaches a terminal status.
    pub working_map: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Durable storage for flight state, keyed by flight id.
pub trait FlightStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save(&self, state: &FlightState) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error if stored state exists but cannot be read.
    fn load(&self, flight_id: FlightId) -> Result<Option<FlightState>, StoreError>;

    /// All stored flights, oldest update first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or an entry cannot be read.
    fn list(&self) -> Result<Vec<FlightState>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the state exists but cannot be removed.
    fn remove(&self, flight_id: FlightId) -> Result<(), StoreError>;
}

/// Keeps flight state in process memory.
#[derive(Debug, Default)]
pub struct InMemoryFlightStore {
    states: Mutex<HashMap<FlightId, FlightState>>,
}

impl InMemoryFlightStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlightStore for InMemoryFlightStore {
    fn save(&self, state: &FlightState) -> Result<(), StoreError> {
        self.states
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(state.flight_id, state.clone());
        Ok(())
    }

    fn load(&self, flight_id: FlightId) -> Result<Option<FlightState>, StoreError> {
        Ok(self
            .states
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .get(&flight_id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<FlightState>, StoreError> {
        let mut states: Vec<FlightState> = self
            .states
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .values()
            .cloned()
            .collect();
        states.sort_by_key(|state| state.updated_at);
        Ok(states)
    }

    fn remove(&self, flight_id: FlightId) -> Result<(), StoreError> {
        self.states
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .remove(&flight_id);
        Ok(())
    }
}

const STATE_EXTENSION: &str = "json";

/// Stores each flight as `<flight-id>.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileSystemFlightStore {
    directory: PathBuf,
}

impl FileSystemFlightStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn state_path(&self, flight_id: FlightId) -> PathBuf {
        self.directory
            .join(format!("{flight_id}.{STATE_EXTENSION}"))
    }
}

impl FlightStore for FileSystemFlightStore {
    fn save(&self, state: &FlightState) -> Result<(), StoreError> {
        let path = self.state_path(state.flight_id);
        fs::create_dir_all(&self.directory).map_err(|source| StoreError::Write {
            path: self.directory.clone(),
            source,
        })?;

        let content =
            serde_json::to_string_pretty(state).map_err(|source| StoreError::Serialize {
                flight_id: state.flight_id,
                source,
            })?;

        // A crash must never leave a truncated state file behind.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|source| StoreError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })
    }

    fn load(&self, flight_id: FlightId) -> Result<Option<FlightState>, StoreError> {
        let path = self.state_path(flight_id);
        match fs::read_to_string(&path) {
            Ok(content) => parse_state(&path, &content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn list(&self) -> Result<Vec<FlightState>, StoreError> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.directory.clone(),
                    source,
                });
            }
        };

        let mut states = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Read {
                    path: self.directory.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STATE_EXTENSION) {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            states.push(parse_state(&path, &content)?);
        }

        states.sort_by_key(|state| state.updated_at);
        Ok(states)
    }

    fn remove(&self, flight_id: FlightId) -> Result<(), StoreError> {
        let path = self.state_path(flight_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }
}

fn parse_state(path: &Path, content: &str) -> Result<FlightState, StoreError> {
    serde_json::from_str(content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
