// ABOUTME: Collaborator seams for build, deploy, and routing operations.
// ABOUTME: The pipeline engine drives these traits; providers plug in behind them.

mod build;
mod command;
mod deployer;
mod error;
mod router;

pub use build::{ArtifactBuilder, BuildRequest, CommandBuilder};
pub use deployer::{CommandDeployer, DeploySpec, Deployer, DeployedService};
pub use error::{TargetError, TargetErrorKind};
pub use router::{CommandRouter, NullRouter, Router};
