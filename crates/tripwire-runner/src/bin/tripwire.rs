use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use tripwire_engine::{trigger_count_message, ConfigLoadError, EngineConfig};
use tripwire_runner::logging::init_logging;
use tripwire_runner::paths::RunnerPaths;
use tripwire_runner::{Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "tripwire", version, about = "Replay trigger scenarios", long_about = None)]
pub struct Cli {
    /// Enables debug logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a scenario and print every activation
    Run {
        scenario: PathBuf,

        /// Engine settings overriding the scenario's [engine] table
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also log to a file named after the scenario
        #[arg(long)]
        log_file: bool,
    },
    /// Validate a scenario and list its triggers
    Check { scenario: PathBuf },
}

/// Explicit config first, then the user's engine.toml, then the scenario
fn engine_config(explicit: Option<&Path>, scenario: &Scenario) -> anyhow::Result<EngineConfig> {
    if let Some(path) = explicit {
        return EngineConfig::load(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()));
    }

    let Some(path) = RunnerPaths::from_env().map(|p| p.engine_config_path()) else {
        return Ok(scenario.engine.clone());
    };
    match EngineConfig::load(&path) {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) => Ok(scenario.engine.clone()),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug > 0 { "debug" } else { "info" };

    match cli.command {
        Command::Check { scenario } => {
            let _guard = init_logging(level, None)?;
            let scenario = Scenario::load(&scenario)
                .with_context(|| format!("Invalid scenario {}", scenario.display()))?;

            println!("{}", scenario.display_name());
            println!("{}", trigger_count_message(scenario.triggers.len()));
            for line in scenario.summary() {
                println!("  {}", line);
            }
            println!("{} step(s)", scenario.steps.len());
        }
        Command::Run {
            scenario,
            config,
            log_file,
        } => {
            let mut scenario = Scenario::load(&scenario)
                .with_context(|| format!("Invalid scenario {}", scenario.display()))?;

            let log_path = if log_file {
                let paths = RunnerPaths::from_env().context("No home directory for log files")?;
                Some(paths.scenario_log_path(scenario.display_name()))
            } else {
                None
            };
            let _guard = init_logging(level, log_path.as_deref())?;
            scenario.engine = engine_config(config.as_deref(), &scenario)?;

            let report = ScenarioRunner::new(scenario).run().await?;
            for record in &report.activations {
                let trigger = &record.activation.trigger;
                println!(
                    "[step {:>3}] t={:>4}s {} \"{}\" ({}) {} action(s) at {}",
                    record.step,
                    record.elapsed,
                    trigger.id,
                    trigger.label,
                    record.activation.event,
                    trigger.actions.len(),
                    record.activation.fired_at.format("%H:%M:%S%.3f"),
                );
            }
            info!(
                "{} step(s) run, {} activation(s)",
                report.steps_run,
                report.activations.len()
            );
        }
    }

    Ok(())
}
