//! `reelflow` binary: drives the run manager from the command line.
//!
//! Collaborator backends are wired per deployment; this binary ships the
//! stub wiring from `reelflow::testing`, which is enough to exercise the
//! full pipeline end to end without any external services. Production
//! embeddings build their own [`reelflow::stage::CollaboratorRegistry`]
//! against the library API.

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::{Cli, Command};
use reelflow::config::ConfigResolver;
use reelflow::run::{RunId, RunManager, RunResult, RunStatus};
use reelflow::schedule;
use reelflow::testing::stub_registry;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let resolver = ConfigResolver::new(&cli.config_root);
    let manager = RunManager::new(resolver, &cli.runs_root, Arc::new(stub_registry(Vec::new())));

    match cli.command {
        Command::Run {
            channel,
            seed,
            resume,
        } => {
            let run_id = match resume {
                Some(id) => RunId::from_string(id),
                None => manager.create_run(&channel, seed)?.run_id,
            };
            let result = manager.execute_run(&run_id).await?;
            report(&result)?;
        }
        Command::Batch { channels, seed } => {
            let plan = parse_batch_plan(&channels)?;
            run_batch(&manager, &plan, seed).await?;
        }
        Command::Schedule { channels } => {
            let resolver = ConfigResolver::new(&cli.config_root);
            let mapping = if channels.is_empty() {
                schedule::export_all(&resolver)?
            } else {
                schedule::export(&resolver, &channels)?
            };
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }
        Command::Cancel { run, reason } => {
            let run_id = RunId::from_string(run);
            let requested = manager.cancel_run(&run_id, &reason)?;
            if requested {
                println!("cancellation requested for {run_id}");
            } else {
                println!("{run_id} is already finished; nothing to cancel");
            }
        }
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Prints the run outcome and turns a failed run into a nonzero exit.
fn report(result: &RunResult) -> anyhow::Result<()> {
    match result.status {
        RunStatus::Succeeded => {
            println!("run {} succeeded", result.run_id);
            Ok(())
        }
        _ => match &result.failure {
            Some(failure) => bail!(
                "run {} failed at stage '{}' ({}): {}",
                result.run_id,
                failure.stage,
                failure.kind,
                failure.reason
            ),
            None => bail!("run {} ended in status {:?}", result.run_id, result.status),
        },
    }
}

/// One batch entry: a channel and how many runs to produce for it.
#[derive(Debug, PartialEq, Eq)]
struct BatchEntry {
    channel: String,
    repeat: u32,
}

/// Parses `name` or `name:repeat` batch arguments.
fn parse_batch_plan(specs: &[String]) -> anyhow::Result<Vec<BatchEntry>> {
    let mut plan = Vec::with_capacity(specs.len());
    for spec in specs {
        let entry = match spec.split_once(':') {
            Some((channel, repeat)) => {
                let repeat: u32 = repeat
                    .parse()
                    .with_context(|| format!("invalid repeat count in '{spec}'"))?;
                if repeat == 0 {
                    bail!("repeat count in '{spec}' must be at least 1");
                }
                BatchEntry {
                    channel: channel.to_string(),
                    repeat,
                }
            }
            None => BatchEntry {
                channel: spec.clone(),
                repeat: 1,
            },
        };
        if entry.channel.is_empty() {
            bail!("empty channel name in '{spec}'");
        }
        plan.push(entry);
    }
    Ok(plan)
}

/// Executes the plan sequentially, stopping at the first failed run.
///
/// Each iteration creates a fresh run, so repeats of the same channel get
/// independent master seeds unless one was pinned on the command line.
async fn run_batch(
    manager: &RunManager,
    plan: &[BatchEntry],
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let total: u32 = plan.iter().map(|entry| entry.repeat).sum();
    let mut completed = 0u32;
    for entry in plan {
        for attempt in 1..=entry.repeat {
            info!(
                channel = %entry.channel,
                attempt,
                of = entry.repeat,
                "starting batch run"
            );
            let record = manager.create_run(&entry.channel, seed)?;
            let result = manager.execute_run(&record.run_id).await?;
            if result.status == RunStatus::Succeeded {
                completed += 1;
                println!(
                    "[{completed}/{total}] {} {} succeeded",
                    entry.channel, result.run_id
                );
            } else {
                println!("batch stopped after {completed}/{total} runs");
                return report(&result);
            }
        }
    }
    println!("batch finished: {completed}/{total} runs succeeded");
    Ok(())
}
