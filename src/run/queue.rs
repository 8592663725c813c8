// ABOUTME: Run queue and worker loop serializing pipeline runs.
// ABOUTME: Triggers are processed strictly one at a time, in arrival order.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline;
use crate::trigger::TriggerKind;
use crate::types::Revision;

use super::executor::{Executor, RunReport};
use super::lock::RunLock;

/// Sending half of the run queue. Cheap to clone; every trigger source
/// holds one.
#[derive(Debug, Clone)]
pub struct RunQueue {
    tx: mpsc::UnboundedSender<TriggerKind>,
}

impl RunQueue {
    /// Enqueue a trigger. Returns false if the worker has shut down.
    pub fn trigger(&self, kind: TriggerKind) -> bool {
        self.tx.send(kind).is_ok()
    }
}

/// Create the run queue and the receiver the worker drains.
pub fn run_queue() -> (RunQueue, mpsc::UnboundedReceiver<TriggerKind>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RunQueue { tx }, rx)
}

/// Drains the run queue, executing at most one run at a time.
///
/// Concurrency control is two-layered: the queue serializes runs within
/// this process, and the run lock serializes across processes.
pub struct PipelineWorker {
    config: PipelineConfig,
    /// Directory to re-discover configuration from before each run.
    config_dir: Option<PathBuf>,
    executor: Executor,
    /// Most recent pushed revision, reused by scheduled runs.
    last_revision: Option<Revision>,
    /// Fingerprint of the definition the previous run executed.
    last_fingerprint: Option<String>,
}

impl PipelineWorker {
    pub fn new(config: PipelineConfig, executor: Executor) -> Self {
        Self {
            config,
            config_dir: None,
            executor,
            last_revision: None,
            last_fingerprint: None,
        }
    }

    /// Reload configuration from this directory before each run, so edits
    /// take effect without restarting the watcher.
    pub fn with_config_reload(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Process triggers until the queue closes.
    pub async fn serve(mut self, mut rx: mpsc::UnboundedReceiver<TriggerKind>) {
        while let Some(trigger) = rx.recv().await {
            if let Err(e) = self.handle(trigger).await {
                tracing::error!("run failed: {}", e);
            }
        }
    }

    /// Execute one trigger. Returns `None` when the trigger is skipped
    /// (push triggers disabled, or no revision seen yet for a schedule).
    pub async fn handle(&mut self, trigger: TriggerKind) -> Result<Option<RunReport>> {
        tracing::info!(trigger = %trigger, "trigger received");

        if let Some(dir) = &self.config_dir {
            match PipelineConfig::discover(dir) {
                Ok(config) => self.config = config,
                Err(e) => {
                    tracing::warn!("failed to reload configuration, keeping previous: {}", e);
                }
            }
        }

        let revision = match trigger {
            TriggerKind::Push { revision } => {
                if !self.config.triggers.on_push {
                    tracing::debug!("push triggers disabled, skipping");
                    return Ok(None);
                }
                self.last_revision = Some(revision.clone());
                revision
            }
            TriggerKind::Schedule | TriggerKind::SelfMutation => {
                match &self.last_revision {
                    Some(revision) => revision.clone(),
                    None => {
                        tracing::warn!("no revision seen yet, skipping {}", trigger);
                        return Ok(None);
                    }
                }
            }
        };

        // Re-synthesize from config every run, so a definition edit takes
        // effect on the very next trigger.
        let definition = pipeline::synthesize(&self.config)?;

        let fingerprint = definition.fingerprint();
        if let Some(previous) = &self.last_fingerprint
            && *previous != fingerprint
        {
            tracing::info!("pipeline definition changed, running updated definition");
        }
        self.last_fingerprint = Some(fingerprint);

        let lock = RunLock::acquire(&self.config.state_dir, &self.config.pipeline, false)?;
        let result = self.executor.execute(&definition, &revision).await;
        if let Err(e) = lock.release() {
            tracing::warn!("failed to release run lock: {}", e);
        }
        if let Err(e) = crate::gate::clear_approvals(&self.config.state_dir) {
            tracing::warn!("failed to clear leftover approvals: {}", e);
        }

        Ok(Some(result?))
    }
}
