// ABOUTME: Run lock to prevent concurrent runs of the same pipeline.
// ABOUTME: Uses atomic file creation with lock info stored in the state dir.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::StageName;

use super::error::RunError;

/// Subdirectory of the state dir holding run locks.
const LOCKS_DIR: &str = "locks";

/// Information about who holds a run lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Pipeline being run.
    pub pipeline: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(pipeline: &StageName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            pipeline: pipeline.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a pipeline.
    pub fn lock_path(state_dir: &Path, pipeline: &StageName) -> PathBuf {
        state_dir.join(LOCKS_DIR).join(format!("{}.lock", pipeline))
    }
}

/// A held run lock. Released explicitly; a crashed holder leaves a lock
/// that auto-breaks once stale.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the run lock for a pipeline.
    ///
    /// Uses `create_new` for atomic lock acquisition (no TOCTOU race).
    /// Returns `RunError::LockHeld` if the lock is held by another
    /// process. Auto-breaks stale locks (>1 hour) with a warning.
    pub fn acquire(
        state_dir: &Path,
        pipeline: &StageName,
        force: bool,
    ) -> Result<Self, RunError> {
        let path = LockInfo::lock_path(state_dir, pipeline);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RunError::Lock(format!("failed to create locks dir: {}", e)))?;
        }

        let info = LockInfo::new(pipeline);
        let json = serde_json::to_string(&info)
            .map_err(|e| RunError::Lock(format!("failed to serialize lock: {}", e)))?;

        if Self::try_create(&path, &json)? {
            return Ok(Self { path });
        }

        // Lock file exists: decide whether to break it.
        if !Self::should_break(&path, force)? {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| RunError::Lock(format!("failed to read lock info: {}", e)))?;
            if let Ok(existing) = serde_json::from_str::<LockInfo>(&content) {
                return Err(RunError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    since: existing.started_at,
                });
            }
            return Err(RunError::Lock("lock held by another process".to_string()));
        }

        tracing::debug!("removing stale/forced lock at {}", path.display());
        let _ = std::fs::remove_file(&path);

        // Retry once; losing the retry means someone else won the race.
        if Self::try_create(&path, &json)? {
            Ok(Self { path })
        } else {
            Err(RunError::Lock(
                "lock acquired by another process during break".to_string(),
            ))
        }
    }

    /// Atomic create-if-not-exists. Returns false if the file already
    /// exists.
    fn try_create(path: &Path, json: &str) -> Result<bool, RunError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .map_err(|e| RunError::Lock(format!("failed to write lock: {}", e)))?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(RunError::Lock(format!("failed to acquire lock: {}", e))),
        }
    }

    /// Check if an existing lock should be broken (stale, forced, or
    /// corrupted).
    fn should_break(path: &Path, force: bool) -> Result<bool, RunError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                // Unreadable or already gone, break it.
                tracing::warn!("lock info unreadable, breaking lock");
                return Ok(true);
            }
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing) => {
                if force {
                    tracing::warn!(
                        "breaking lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else if existing.is_stale() {
                    tracing::warn!(
                        "auto-breaking stale lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(_) => {
                tracing::warn!("lock info corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    /// Release the lock.
    pub fn release(self) -> Result<(), RunError> {
        std::fs::remove_file(&self.path)
            .map_err(|e| RunError::Lock(format!("failed to release lock: {}", e)))
    }
}
