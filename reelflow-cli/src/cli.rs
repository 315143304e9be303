//! Command-line interface for the reelflow runner, using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reelflow pipeline runner
///
/// Creates, resumes, and cancels short-form video pipeline runs, and
/// exports per-channel upload schedules for an external scheduler.
#[derive(Parser, Debug)]
#[command(name = "reelflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding per-channel config files
    #[arg(long, global = true, value_name = "DIR", default_value = "channels")]
    pub config_root: PathBuf,

    /// Directory holding run state and artifacts
    #[arg(long, global = true, value_name = "DIR", default_value = "runs")]
    pub runs_root: PathBuf,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and execute one run for a channel
    Run {
        /// The channel to produce for
        #[arg(long)]
        channel: String,

        /// Explicit master seed (random if omitted, always recorded)
        #[arg(long)]
        seed: Option<u64>,

        /// Resume an existing run instead of creating a new one
        #[arg(long, value_name = "RUN_ID")]
        resume: Option<String>,
    },

    /// Execute several channels back-to-back, stopping at the first failure
    Batch {
        /// Channels as name or name:repeat (e.g. facts_channel:3)
        #[arg(long = "channel", required = true, value_name = "NAME[:REPEAT]")]
        channels: Vec<String>,

        /// Explicit master seed applied to every created run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the channel -> times-of-day upload schedule as JSON
    Schedule {
        /// Restrict to specific channels (default: every configured channel)
        #[arg(long = "channel", value_name = "NAME")]
        channels: Vec<String>,
    },

    /// Request cancellation of a pending or running run
    Cancel {
        /// The run to cancel
        #[arg(long, value_name = "RUN_ID")]
        run: String,

        /// Reason recorded in the audit log
        #[arg(long, default_value = "cancelled from cli")]
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_parses() {
        let cli = Cli::parse_from([
            "reelflow", "run", "--channel", "facts_channel", "--seed", "42",
        ]);
        match cli.command {
            Command::Run { channel, seed, resume } => {
                assert_eq!(channel, "facts_channel");
                assert_eq!(seed, Some(42));
                assert!(resume.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_batch_requires_a_channel() {
        assert!(Cli::try_parse_from(["reelflow", "batch"]).is_err());
    }
}
