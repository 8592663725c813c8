// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relevo")]
#[command(about = "Staged environment promotion pipeline for container services")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new relevo.yml configuration file
    Init {
        /// Pipeline name
        #[arg(short, long)]
        pipeline: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the pipeline once for a revision
    Run {
        /// Source revision (commit hash, tag, or similar)
        revision: String,

        /// Break an existing run lock
        #[arg(short, long)]
        force: bool,
    },

    /// Queue a run for a pushed revision on the watching process
    Push {
        /// Source revision (commit hash, tag, or similar)
        revision: String,
    },

    /// Watch for triggers and run the pipeline continuously
    Watch {
        /// Initial revision to run immediately
        revision: Option<String>,
    },

    /// Approve a waiting gate so the pipeline can proceed
    Approve {
        /// Gate name, as configured in the stage's gates list
        gate: String,
    },

    /// Show the configured pipeline
    Status,
}
