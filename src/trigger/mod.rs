// ABOUTME: Run trigger sources: push markers, the schedule timer, config watching.
// ABOUTME: Every source multiplexes into the run queue through one loop.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::run::RunQueue;
use crate::types::Revision;

/// File under the state dir announcing a pushed revision to the watcher.
const PUSH_MARKER: &str = "push.requested";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger state error: {0}")]
    State(String),
}

/// What caused a run to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// A new source revision was pushed.
    Push { revision: Revision },
    /// The periodic schedule fired; re-runs the last seen revision.
    Schedule,
    /// The pipeline definition itself changed since the last run.
    SelfMutation,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Push { revision } => write!(f, "push ({})", revision),
            TriggerKind::Schedule => write!(f, "schedule"),
            TriggerKind::SelfMutation => write!(f, "self-mutation"),
        }
    }
}

/// A pushed revision, recorded in the marker file by `relevo push`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRecord {
    pub revision: String,
    pub requested_at: DateTime<Utc>,
}

/// Path of the push marker under a pipeline state dir.
pub fn push_marker_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PUSH_MARKER)
}

/// Announce a pushed revision so a watching process picks it up.
///
/// A second push before the watcher polls overwrites the first; only the
/// newest revision is worth running.
pub fn request_push(state_dir: &Path, revision: &Revision) -> Result<PathBuf, TriggerError> {
    std::fs::create_dir_all(state_dir)
        .map_err(|e| TriggerError::State(format!("failed to create state dir: {}", e)))?;

    let record = PushRecord {
        revision: revision.to_string(),
        requested_at: Utc::now(),
    };
    let json = serde_json::to_string(&record)
        .map_err(|e| TriggerError::State(format!("failed to serialize push record: {}", e)))?;

    let path = push_marker_path(state_dir);
    std::fs::write(&path, json)
        .map_err(|e| TriggerError::State(format!("failed to write push marker: {}", e)))?;

    Ok(path)
}

/// Consume the push marker, if one is present.
///
/// The marker is removed before it is parsed, so a corrupt one is
/// discarded rather than re-read forever.
pub fn take_push(state_dir: &Path) -> Result<Option<Revision>, TriggerError> {
    let path = push_marker_path(state_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(TriggerError::State(format!(
                "failed to read push marker: {}",
                e
            )));
        }
    };

    std::fs::remove_file(&path)
        .map_err(|e| TriggerError::State(format!("failed to consume push marker: {}", e)))?;

    let record: PushRecord = match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("discarding unreadable push marker: {}", e);
            return Ok(None);
        }
    };

    match Revision::new(&record.revision) {
        Ok(revision) => Ok(Some(revision)),
        Err(e) => {
            tracing::warn!("discarding push marker with invalid revision: {}", e);
            Ok(None)
        }
    }
}

/// Multiplexes every trigger source into the run queue: push markers and
/// configuration changes are polled, the schedule fires on its period.
#[derive(Debug)]
pub struct TriggerLoop {
    schedule_period: Duration,
    poll_interval: Duration,
    state_dir: PathBuf,
    config_path: Option<PathBuf>,
}

impl TriggerLoop {
    pub fn new(schedule_period: Duration, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            schedule_period,
            poll_interval: Duration::from_secs(2),
            state_dir: state_dir.into(),
            config_path: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Also watch a configuration file, enqueuing a run when it changes.
    pub fn with_config_watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Feed the queue until the worker drops the receiver.
    ///
    /// The first schedule tick is skipped so starting the watcher does not
    /// immediately trigger a run. A trigger that lands while a run is in
    /// progress queues behind it; missed ticks are delayed rather than
    /// bursted.
    pub async fn run(self, queue: RunQueue) {
        let mut schedule = tokio::time::interval(self.schedule_period);
        schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        schedule.tick().await;

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut config_seen = self.config_path.as_deref().and_then(modified_at);

        loop {
            let alive = tokio::select! {
                _ = schedule.tick() => {
                    tracing::info!("schedule fired, enqueuing run");
                    queue.trigger(TriggerKind::Schedule)
                }
                _ = poll.tick() => self.poll_once(&queue, &mut config_seen),
            };
            if !alive {
                // Receiver gone, the worker has shut down.
                return;
            }
        }
    }

    fn poll_once(&self, queue: &RunQueue, config_seen: &mut Option<SystemTime>) -> bool {
        match take_push(&self.state_dir) {
            Ok(Some(revision)) => {
                tracing::info!(%revision, "push requested, enqueuing run");
                if !queue.trigger(TriggerKind::Push { revision }) {
                    return false;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to check push marker: {}", e),
        }

        if let Some(path) = self.config_path.as_deref() {
            let current = modified_at(path);
            if current != *config_seen {
                *config_seen = current;
                tracing::info!("configuration changed, enqueuing run");
                return queue.trigger(TriggerKind::SelfMutation);
            }
        }

        true
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
