// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod artifact_ref;
mod id;
mod revision;
mod stage_name;

pub use artifact_ref::{ArtifactRef, ParseArtifactRefError};
pub use id::{DeploymentId, RunId};
pub use revision::{Revision, RevisionError};
pub use stage_name::{StageName, StageNameError};
