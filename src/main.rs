// ABOUTME: Entry point for the relevo CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use relevo::config::{self, PipelineConfig};
use relevo::deploy::{CommandBuilder, CommandDeployer, CommandRouter, NullRouter, Router};
use relevo::diagnostics::{Diagnostics, Warning};
use relevo::error::{Error, Result};
use relevo::gate::{self, FileApprover};
use relevo::output::{Output, OutputMode};
use relevo::pipeline::{self, Unit};
use relevo::run::{Collaborators, Executor, PipelineWorker, RunLock, run_queue};
use relevo::trigger::{self, TriggerKind, TriggerLoop};
use relevo::types::{Revision, StageName};
use relevo::validate::HttpValidator;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli, output).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut output: Output) -> Result<()> {
    match cli.command {
        Commands::Init { pipeline, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, pipeline.as_deref(), force)?;
            output.success(&format!("wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Run { revision, force } => {
            let cwd = env::current_dir()?;
            let config = PipelineConfig::discover(&cwd)?;
            let revision = Revision::new(&revision)?;
            run_once(config, revision, force, &mut output).await
        }
        Commands::Push { revision } => {
            let cwd = env::current_dir()?;
            let config = PipelineConfig::discover(&cwd)?;
            let revision = Revision::new(&revision)?;

            let path = trigger::request_push(&config.state_dir, &revision)?;
            output.success(&format!(
                "queued push for {} ({})",
                revision,
                path.display()
            ));
            Ok(())
        }
        Commands::Watch { revision } => {
            let cwd = env::current_dir()?;
            let config = PipelineConfig::discover(&cwd)?;
            let revision = revision.map(|r| Revision::new(&r)).transpose()?;
            watch(config, revision, &cwd).await
        }
        Commands::Approve { gate } => {
            let cwd = env::current_dir()?;
            let config = PipelineConfig::discover(&cwd)?;

            let Some(configured) = config.find_gate(&gate) else {
                return Err(Error::UnknownGate(gate));
            };

            let path = gate::approve(&config.state_dir, &configured.name)?;
            output.success(&format!(
                "approved gate {} ({})",
                configured.name,
                path.display()
            ));
            Ok(())
        }
        Commands::Status => {
            let cwd = env::current_dir()?;
            let config = PipelineConfig::discover(&cwd)?;
            status(&config, &output)
        }
    }
}

/// Assemble the collaborator set from configuration. Every external
/// effect the run performs goes through one of these.
fn collaborators(config: &PipelineConfig) -> Collaborators {
    let router: Arc<dyn Router> = match &config.routing {
        Some(routing) => Arc::new(CommandRouter::new(routing.command.clone())),
        None => Arc::new(NullRouter),
    };

    Collaborators {
        builder: Arc::new(CommandBuilder::new()),
        deployer: Arc::new(CommandDeployer::new(config.deploy.command.clone())),
        router,
        validator: Arc::new(HttpValidator::new()),
        approver: Arc::new(FileApprover::new(&config.state_dir)),
    }
}

/// Execute the pipeline once for a revision, holding the run lock for the
/// duration.
async fn run_once(
    config: PipelineConfig,
    revision: Revision,
    force: bool,
    output: &mut Output,
) -> Result<()> {
    let definition = pipeline::synthesize(&config)?;
    let build_env = config::resolve_env_map(&config.build.credentials)?;
    let executor = Executor::new(collaborators(&config), config.registry.clone(), build_env);

    let lock = RunLock::acquire(&config.state_dir, &config.pipeline, force)?;

    output.start_timer();
    output.progress(&format!(
        "running pipeline {} at revision {}",
        config.pipeline, revision
    ));

    let result = executor.execute(&definition, &revision).await;

    let mut diagnostics = Diagnostics::default();
    if let Err(e) = lock.release() {
        diagnostics.warn(Warning::lock_release(format!(
            "failed to release run lock: {}",
            e
        )));
    }
    if let Err(e) = gate::clear_approvals(&config.state_dir) {
        diagnostics.warn(Warning::approval_cleanup(e.to_string()));
    }

    let report = result?;
    output.report(&report);
    for warning in diagnostics.warnings() {
        output.progress(&format!("warning: {}", warning.message));
    }
    Ok(())
}

/// Run continuously: drain the trigger queue one run at a time, fed by
/// push markers, the periodic schedule, and configuration changes.
async fn watch(config: PipelineConfig, revision: Option<Revision>, cwd: &Path) -> Result<()> {
    let build_env = config::resolve_env_map(&config.build.credentials)?;
    let executor = Executor::new(collaborators(&config), config.registry.clone(), build_env);

    let (queue, rx) = run_queue();

    if let Some(revision) = revision {
        queue.trigger(TriggerKind::Push { revision });
    }

    let mut triggers = TriggerLoop::new(config.triggers.schedule, config.state_dir.clone());
    if let Ok(path) = PipelineConfig::discover_path(cwd) {
        triggers = triggers.with_config_watch(path);
    }
    let trigger_task = tokio::spawn(triggers.run(queue.clone()));

    let worker = PipelineWorker::new(config, executor).with_config_reload(cwd.to_path_buf());
    worker.serve(rx).await;

    trigger_task.abort();
    Ok(())
}

/// Print the synthesized pipeline: units in execution order with their
/// gates and validations.
fn status(config: &PipelineConfig, output: &Output) -> Result<()> {
    let definition = pipeline::synthesize(config)?;

    output.progress(&format!("pipeline: {}", definition.name()));
    output.progress(&format!("registry: {}", config.registry));

    for unit in definition.units() {
        match unit {
            Unit::Wave(wave) => {
                let steps: Vec<&StageName> = wave.produces().collect();
                output.progress(&format!(
                    "  wave {} ({} step{})",
                    wave.name,
                    steps.len(),
                    if steps.len() == 1 { "" } else { "s" }
                ));
                for step in steps {
                    output.progress(&format!("    build {}", step));
                }
            }
            Unit::Stage(stage) => {
                output.progress(&format!(
                    "  stage {} (artifact {}, weight {}%)",
                    stage.name, stage.artifact, stage.environment.traffic_weight
                ));
                for gate in &stage.pre {
                    output.progress(&format!("    gate {}: {}", gate.name, gate.comment));
                }
                for validation in &stage.post {
                    output.progress(&format!("    validate /{}/{}", stage.name, validation.path));
                }
            }
        }
    }

    Ok(())
}
