// ABOUTME: Approval gate satisfaction via external signals.
// ABOUTME: FileApprover polls a marker file written by `relevo approve`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::ApprovalGate;
use crate::types::StageName;

/// Subdirectory of the state dir holding approval markers.
const APPROVALS_DIR: &str = "approvals";

#[derive(Debug, Error)]
pub enum GateError {
    #[error("approval state error: {0}")]
    State(String),
}

/// Who approved a gate, recorded in the marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Hostname of the machine the approval came from.
    pub approver: String,
    /// Process ID of the approving process.
    pub pid: u32,
    /// When the gate was approved.
    pub approved_at: DateTime<Utc>,
    /// Gate being approved.
    pub gate: String,
}

impl ApprovalRecord {
    pub fn new(gate: &StageName) -> Self {
        Self {
            approver: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            approved_at: Utc::now(),
            gate: gate.to_string(),
        }
    }
}

/// Path of the approval marker for a gate.
pub fn marker_path(state_dir: &Path, gate: &StageName) -> PathBuf {
    state_dir
        .join(APPROVALS_DIR)
        .join(format!("{}.approved", gate))
}

/// Record an approval so a waiting pipeline run can proceed.
pub fn approve(state_dir: &Path, gate: &StageName) -> Result<PathBuf, GateError> {
    let path = marker_path(state_dir, gate);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| GateError::State(format!("failed to create approvals dir: {}", e)))?;
    }

    let record = ApprovalRecord::new(gate);
    let json = serde_json::to_string(&record)
        .map_err(|e| GateError::State(format!("failed to serialize approval: {}", e)))?;
    std::fs::write(&path, json)
        .map_err(|e| GateError::State(format!("failed to write approval marker: {}", e)))?;

    Ok(path)
}

/// Remove leftover approval markers after a run ends.
///
/// An approval given for a run that failed before reaching its gate must
/// not carry over to the next run. Returns the number of markers removed.
pub fn clear_approvals(state_dir: &Path) -> Result<usize, GateError> {
    let dir = state_dir.join(APPROVALS_DIR);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(GateError::State(format!(
                "failed to read approvals dir: {}",
                e
            )));
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry =
            entry.map_err(|e| GateError::State(format!("failed to read approvals dir: {}", e)))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "approved") {
            std::fs::remove_file(&path).map_err(|e| {
                GateError::State(format!("failed to remove approval marker: {}", e))
            })?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Blocks a pipeline run until a gate is externally acknowledged.
///
/// There is deliberately no timeout: an unapproved gate holds the run
/// indefinitely, and the wait consumes nothing but a polling timer.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn await_approval(&self, gate: &ApprovalGate) -> Result<(), GateError>;
}

/// Polls for an approval marker file under the pipeline state directory.
///
/// The marker is consumed on approval, so each run requires a fresh
/// acknowledgment.
#[derive(Debug, Clone)]
pub struct FileApprover {
    state_dir: PathBuf,
    poll_interval: Duration,
}

impl FileApprover {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl Approver for FileApprover {
    async fn await_approval(&self, gate: &ApprovalGate) -> Result<(), GateError> {
        let path = marker_path(&self.state_dir, &gate.name);

        tracing::info!(gate = %gate.name, "pipeline paused: {}", gate.comment);
        tracing::info!(gate = %gate.name, "approve with: relevo approve {}", gate.name);

        loop {
            if path.is_file() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<ApprovalRecord>(&content) {
                        Ok(record) => {
                            tracing::info!(
                                gate = %gate.name,
                                "approved by {} (pid {}) at {}",
                                record.approver,
                                record.pid,
                                record.approved_at
                            );
                        }
                        Err(_) => {
                            tracing::warn!(gate = %gate.name, "approval marker unreadable, accepting");
                        }
                    },
                    Err(e) => {
                        return Err(GateError::State(format!(
                            "failed to read approval marker: {}",
                            e
                        )));
                    }
                }

                // Consume the marker so the next run waits again.
                std::fs::remove_file(&path).map_err(|e| {
                    GateError::State(format!("failed to consume approval marker: {}", e))
                })?;

                return Ok(());
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_path_uses_approvals_dir() {
        let gate = StageName::new("canary-cutover").unwrap();
        let path = marker_path(Path::new("/tmp/state"), &gate);
        assert_eq!(
            path,
            PathBuf::from("/tmp/state/approvals/canary-cutover.approved")
        );
    }

    #[test]
    fn clear_approvals_removes_only_markers() {
        let dir = tempfile::tempdir().unwrap();
        let gate = StageName::new("canary-cutover").unwrap();
        approve(dir.path(), &gate).unwrap();

        let stray = dir.path().join(APPROVALS_DIR).join("notes.txt");
        std::fs::write(&stray, "keep me").unwrap();

        let removed = clear_approvals(dir.path()).unwrap();
        assert_eq!(removed, 1);
        assert!(stray.exists());
        assert!(!marker_path(dir.path(), &gate).exists());
    }

    #[test]
    fn clear_approvals_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(clear_approvals(dir.path()).unwrap(), 0);
    }

    #[test]
    fn approval_record_carries_host_and_pid() {
        let gate = StageName::new("full-promotion").unwrap();
        let record = ApprovalRecord::new(&gate);

        assert_eq!(record.gate, "full-promotion");
        assert_eq!(record.pid, std::process::id());
        assert!(!record.approver.is_empty());
    }
}
