//! Typed error hierarchy for the tandem orchestrator.
//!
//! Two top-level enums cover the two failure surfaces:
//! - `InvocationError`: a single agent subprocess call failed
//! - `OrchestratorError`: the workflow itself cannot continue

use std::path::PathBuf;
use thiserror::Error;

use crate::orchestrator::state::WorkflowPhase;

/// Failure of one agent invocation.
///
/// The retry wrapper treats every variant the same way: the attempt failed,
/// its message becomes a diagnostic and drives the next attempt.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("{agent} could not be launched: {source}")]
    Launch {
        agent: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{agent} timed out after {seconds}s.")]
    Timeout { agent: String, seconds: u64 },

    #[error("{agent} failed (exit {code}): {detail}")]
    NonZeroExit {
        agent: String,
        code: i32,
        detail: String,
    },

    #[error("{agent} returned empty output.")]
    EmptyOutput { agent: String },

    #[error("unknown agent '{agent}'")]
    UnknownAgent { agent: String },
}

impl InvocationError {
    /// Key of the agent this failure belongs to.
    pub fn agent(&self) -> &str {
        match self {
            Self::Launch { agent, .. }
            | Self::Timeout { agent, .. }
            | Self::NonZeroExit { agent, .. }
            | Self::EmptyOutput { agent }
            | Self::UnknownAgent { agent } => agent,
        }
    }
}

/// Fatal workflow errors. Each aborts the run with a non-zero exit.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{step}: {agent} did not produce valid output after {attempts} attempts: {diagnostics}")]
    RetriesExhausted {
        step: String,
        agent: String,
        attempts: u32,
        diagnostics: String,
    },

    #[error("{phase} failed: {reason}")]
    PhaseFailed { phase: WorkflowPhase, reason: String },

    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unsupported state schema version {found} in {path}")]
    UnsupportedSchema { path: PathBuf, found: u64 },

    #[error("Phase 1 is not completed. Stopping before implementation.")]
    PlanningIncomplete,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
