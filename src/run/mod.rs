// ABOUTME: Pipeline run orchestration using the type state pattern.
// ABOUTME: Exports the executor, run queue, lock, and per-stage state machine.

mod error;
mod executor;
mod lock;
mod queue;
mod stage_run;
mod state;
mod transitions;

pub use error::RunError;
pub use executor::{Collaborators, Executor, RunReport, StageOutcome};
pub use lock::{LockInfo, RunLock};
pub use queue::{PipelineWorker, RunQueue, run_queue};
pub use stage_run::StageRun;
pub use state::{Deployed, GatesCleared, Pending, Promoted, RunState, StagePhase, Validated};
