use std::time::Instant;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step is running or completed its `do`.
    Executed,
    /// Step failed fatally or exhausted its retries.
    Failed,
    /// Step was undone successfully.
    Undone,
    /// Step undo failed.
    UndoFailed,
    /// Step cannot be undone; the undo cascade skipped it.
    Irreversible,
}

/// Record of a step's execution in the flight.
#[derive(Debug)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// Number of `do` attempts made.
    pub attempts: u32,
    /// When the step started executing.
    pub started_at: Instant,
    /// When the step completed (do or undo).
    pub completed_at: Option<Instant>,
    /// Description of undo (if the step completed).
    pub undo_description: Option<String>,
}

/// Audit log tracking all step executions in a flight.
#[derive(Debug, Default)]
pub struct FlightAuditLog {
    records: Vec<StepRecord>,
}

impl FlightAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, name: &str) {
        self.records.push(StepRecord {
            name: name.to_string(),
            status: StepStatus::Executed,
            attempts: 0,
            started_at: Instant::now(),
            completed_at: None,
            undo_description: None,
        });
    }

    pub(crate) fn record_attempt(&mut self) {
        if let Some(record) = self.records.last_mut() {
            record.attempts += 1;
        }
    }

    pub(crate) fn record_failure(&mut self) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Failed;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_success(&mut self, undo_description: String) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Executed;
            record.completed_at = Some(Instant::now());
            record.undo_description = Some(undo_description);
        }
    }

    pub(crate) fn record_undo(&mut self, step_name: &str, status: StepStatus) {
        if let Some(record) = self
            .records
            .iter_mut()
            .rev()
            .find(|record| record.name == step_name && record.status == StepStatus::Executed)
        {
            record.status = status;
            record.completed_at = Some(Instant::now());
        } else {
            // Undo of a step completed before a resume: no forward record exists.
            self.records.push(StepRecord {
                name: step_name.to_string(),
                status,
                attempts: 0,
                started_at: Instant::now(),
                completed_at: Some(Instant::now()),
                undo_description: None,
            });
        }
    }

    /// Get all records in the audit log.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Names of the steps with the given status, in record order.
    #[must_use]
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&str> {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.name.as_str())
            .collect()
    }

    /// Get a summary of the flight execution for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StepStatus::Executed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Undone => "↩",
                StepStatus::UndoFailed => "⚠",
                StepStatus::Irreversible => "⊘",
            };
            if record.attempts > 1 {
                lines.push(format!("{status} {} ({} attempts)", record.name, record.attempts));
            } else {
                lines.push(format!("{status} {}", record.name));
            }
        }
        lines.join("\n")
    }
}
