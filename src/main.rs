use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tandem::orchestrator::WorkflowPhase;
use tandem::tandem_config::{AgentOutputMode, LiveStreamMode, StreamChannels};

mod cmd;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(version, about = "Dual-agent orchestrator: plan and implement through reviewed cycles")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the planning and implementation phases for the task file
    Run(RunArgs),
    /// Show the summary of the current or last run
    Status,
    /// Check agent executables and provider DNS without running anything
    Preflight {
        /// Fail when a provider host does not resolve
        #[arg(long)]
        strict: bool,
        /// Also check the configured fallback agents
        #[arg(long)]
        with_fallback: bool,
    },
    /// View, create or validate .tandem/tandem.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Task file (default: TASK.md, then task.md)
    #[arg(long)]
    pub task_file: Option<PathBuf>,

    /// Resume from the existing .tandem/state.json
    #[arg(long)]
    pub resume: bool,

    /// Overwrite an existing state file without asking
    #[arg(long)]
    pub force_overwrite_state: bool,

    /// Force the current phase before running
    #[arg(long, value_enum)]
    pub from_phase: Option<FromPhase>,

    /// Retries per agent call after the first failed attempt
    #[arg(long)]
    pub max_agent_retries: Option<u32>,

    #[arg(long)]
    pub phase1_max_cycles: Option<u32>,

    #[arg(long)]
    pub phase2_max_cycles: Option<u32>,

    /// Fail preflight when a provider host does not resolve
    #[arg(long)]
    pub strict_preflight: bool,

    /// Skip the confirmation gate between phase 1 and phase 2
    #[arg(long)]
    pub auto: bool,

    /// Simulate agent responses and tests to check the workflow wiring
    #[arg(long)]
    pub dry_run: bool,

    /// Do not roll an interrupted cycle back to its checkpoint on resume
    #[arg(long)]
    pub no_recover: bool,

    #[arg(long, value_enum)]
    pub agent_output: Option<AgentOutputMode>,

    /// Characters shown per agent reply in summary mode (min 200)
    #[arg(long)]
    pub agent_output_max_chars: Option<usize>,

    /// Stream agent stdout/stderr while they run
    #[arg(long)]
    pub agent_live_stream: bool,

    #[arg(long, value_enum)]
    pub agent_live_stream_mode: Option<LiveStreamMode>,

    #[arg(long, value_enum)]
    pub agent_live_stream_channels: Option<StreamChannels>,

    /// Retry a quota-limited step once with the agent's fallback
    #[arg(long)]
    pub allow_fallback: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromPhase {
    Phase1,
    Phase2,
}

impl From<FromPhase> for WorkflowPhase {
    fn from(phase: FromPhase) -> Self {
        match phase {
            FromPhase::Phase1 => WorkflowPhase::Planning,
            FromPhase::Phase2 => WorkflowPhase::Implementation,
        }
    }
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a default tandem.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = matches!(cli.command, Commands::Run(_))
        .then(|| project_dir.join(tandem::config::TANDEM_DIR).join("logs"));
    let _log_guard = tandem::logging::init(cli.verbose, log_dir.as_deref());

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, project_dir, args).await?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Preflight {
            strict,
            with_fallback,
        } => cmd::cmd_preflight(&project_dir, *strict, *with_fallback).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "tandem",
            "run",
            "--auto",
            "--dry-run",
            "--from-phase",
            "phase2",
            "--phase1-max-cycles",
            "2",
            "--agent-output",
            "none",
            "--agent-live-stream-channels",
            "stderr",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.auto && args.dry_run);
        assert_eq!(args.from_phase, Some(FromPhase::Phase2));
        assert_eq!(args.phase1_max_cycles, Some(2));
        assert_eq!(args.phase2_max_cycles, None);
        assert_eq!(args.agent_output, Some(AgentOutputMode::None));
        assert_eq!(args.agent_live_stream_channels, Some(StreamChannels::Stderr));
        assert_eq!(
            WorkflowPhase::from(FromPhase::Phase2),
            WorkflowPhase::Implementation
        );
    }

    #[test]
    fn cli_rejects_unknown_phase() {
        assert!(Cli::try_parse_from(["tandem", "run", "--from-phase", "phase3"]).is_err());
    }

    #[test]
    fn cli_verbose_is_global() {
        let cli = Cli::try_parse_from(["tandem", "status", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
