//! Durable workflow state, persisted as `.tandem/state.json`.
//!
//! The file is rewritten atomically after every mutation. Its layout is
//! versioned by `schema_version`; older layouts are upgraded on load by
//! [`super::migrate`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{migrate, persist};
use crate::contract::{Approval, FindingId, FindingRecord};
use crate::errors::OrchestratorError;
use crate::util;

/// Current state file layout.
pub const SCHEMA_VERSION: u64 = 3;

/// Which part of the workflow the run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowPhase {
    #[serde(rename = "phase1")]
    Planning,
    #[serde(rename = "phase2")]
    Implementation,
    #[serde(rename = "done")]
    Done,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "phase1",
            Self::Implementation => "phase2",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Cycle bookkeeping shared by both phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub status: PhaseStatus,
    /// Last cycle started. Zero before the first cycle.
    pub cycle: u32,
    pub max_cycles: u32,
    /// Findings the last accepted review left open, in the reviewer's order.
    pub open_findings: Vec<FindingId>,
    pub finding_history: BTreeMap<FindingId, FindingRecord>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseProgress {
    pub fn new(max_cycles: u32) -> Self {
        Self {
            status: PhaseStatus::Pending,
            cycle: 0,
            max_cycles,
            open_findings: Vec::new(),
            finding_history: BTreeMap::new(),
            error: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningState {
    #[serde(flatten)]
    pub progress: PhaseProgress,
    pub reviewer_approval: Approval,
    /// Planner confirmation, after the reviewer override.
    pub planner_approval: Approval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationState {
    #[serde(flatten)]
    pub progress: PhaseProgress,
    pub implementation_ready: Approval,
    pub reviewer_approval: Approval,
    pub last_test_exit: Option<i32>,
}

/// Files a run writes besides the state itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    /// Snapshot of the task file taken at every start.
    pub task: PathBuf,
    pub phase1_transcript: PathBuf,
    pub phase2_transcript: PathBuf,
}

impl ArtifactPaths {
    pub fn new(runs_dir: &Path, run_id: &str) -> Self {
        let run_dir = runs_dir.join(run_id);
        Self {
            task: run_dir.join("00_task.md"),
            phase1_transcript: run_dir.join("10_phase1_plan.md"),
            phase2_transcript: run_dir.join("20_phase2_implementation.md"),
            run_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub schema_version: u64,
    pub run_id: String,
    pub task_file: PathBuf,
    pub phase: WorkflowPhase,
    pub artifacts: ArtifactPaths,
    pub phase1: PlanningState,
    pub phase2: ImplementationState,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh state for a new run.
    pub fn new(
        task_file: &Path,
        runs_dir: &Path,
        run_id: String,
        phase1_max_cycles: u32,
        phase2_max_cycles: u32,
    ) -> Self {
        let now = util::now();
        Self {
            schema_version: SCHEMA_VERSION,
            artifacts: ArtifactPaths::new(runs_dir, &run_id),
            run_id,
            task_file: task_file.to_path_buf(),
            phase: WorkflowPhase::Planning,
            phase1: PlanningState {
                progress: PhaseProgress::new(phase1_max_cycles),
                reviewer_approval: Approval::No,
                planner_approval: Approval::No,
            },
            phase2: ImplementationState {
                progress: PhaseProgress::new(phase2_max_cycles),
                implementation_ready: Approval::No,
                reviewer_approval: Approval::No,
                last_test_exit: None,
            },
            started_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = util::now();
    }

    /// Progress record of a working phase. `Done` has none.
    pub fn progress(&self, phase: WorkflowPhase) -> Option<&PhaseProgress> {
        match phase {
            WorkflowPhase::Planning => Some(&self.phase1.progress),
            WorkflowPhase::Implementation => Some(&self.phase2.progress),
            WorkflowPhase::Done => None,
        }
    }

    pub fn progress_mut(&mut self, phase: WorkflowPhase) -> Option<&mut PhaseProgress> {
        match phase {
            WorkflowPhase::Planning => Some(&mut self.phase1.progress),
            WorkflowPhase::Implementation => Some(&mut self.phase2.progress),
            WorkflowPhase::Done => None,
        }
    }

    /// Decode a state document of any supported schema version.
    pub fn decode(content: &str, path: &Path, runs_dir: &Path) -> Result<Self, OrchestratorError> {
        let value: serde_json::Value = serde_json::from_str(content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let version = value
            .get("schema_version")
            .or_else(|| value.get("version"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);

        match version {
            SCHEMA_VERSION => Ok(serde_json::from_value(value)
                .with_context(|| format!("Invalid state in {}", path.display()))?),
            migrate::LEGACY_VERSION => {
                info!(path = %path.display(), "migrating state from schema {}", version);
                Ok(migrate::from_v2(&value, runs_dir)
                    .with_context(|| format!("Failed to migrate {}", path.display()))?)
            }
            found => Err(OrchestratorError::UnsupportedSchema {
                path: path.to_path_buf(),
                found,
            }),
        }
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        persist::to_pretty_json(self)
    }
}

/// Reads and writes the single state file of a project.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    runs_dir: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf, runs_dir: PathBuf) -> Self {
        Self { path, runs_dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the state, or `None` if no state file exists yet.
    pub fn load(&self) -> Result<Option<WorkflowState>, OrchestratorError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(OrchestratorError::Persistence {
                    path: self.path.clone(),
                    source: anyhow::Error::new(err).context("read state file"),
                });
            }
        };
        WorkflowState::decode(&content, &self.path, &self.runs_dir).map(Some)
    }

    pub fn save(&self, state: &WorkflowState) -> Result<(), OrchestratorError> {
        let content = state
            .encode()
            .map_err(|source| OrchestratorError::Persistence {
                path: self.path.clone(),
                source,
            })?;
        persist::atomic_write(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FindingStatus;
    use tempfile::tempdir;

    fn sample(runs_dir: &Path) -> WorkflowState {
        WorkflowState::new(Path::new("TASK.md"), runs_dir, "20260102-030405Z".into(), 4, 6)
    }

    #[test]
    fn test_new_state_layout() {
        let state = sample(Path::new("/p/.tandem/runs"));
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert_eq!(state.phase, WorkflowPhase::Planning);
        assert_eq!(state.phase1.progress.status, PhaseStatus::Pending);
        assert_eq!(state.phase1.progress.max_cycles, 4);
        assert_eq!(state.phase2.progress.max_cycles, 6);
        assert_eq!(
            state.artifacts.phase1_transcript,
            Path::new("/p/.tandem/runs/20260102-030405Z/10_phase1_plan.md")
        );
    }

    #[test]
    fn test_phase_serializes_as_short_keys() {
        assert_eq!(serde_json::to_string(&WorkflowPhase::Planning).unwrap(), "\"phase1\"");
        assert_eq!(serde_json::to_string(&WorkflowPhase::Done).unwrap(), "\"done\"");
        assert_eq!(serde_json::to_string(&PhaseStatus::Running).unwrap(), "\"running\"");
    }

    #[test]
    fn test_progress_fields_are_flattened() {
        let state = sample(Path::new("runs"));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["phase1"]["cycle"], 0);
        assert_eq!(value["phase1"]["reviewer_approval"], "NO");
        assert!(value["phase2"]["last_test_exit"].is_null());
    }

    #[test]
    fn test_store_roundtrip_preserves_history() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"), dir.path().join("runs"));
        assert!(store.load().unwrap().is_none());

        let mut state = sample(&dir.path().join("runs"));
        let id = FindingId::parse("F-001").unwrap();
        state.phase1.progress.open_findings.push(id.clone());
        state
            .phase1
            .progress
            .finding_history
            .insert(id, FindingRecord::open("Missing tests", "Tests cover the parser"));
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), state);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.ends_with("}\n"));
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"schema_version": 9}"#).unwrap();
        let store = StateStore::new(path, dir.path().join("runs"));
        match store.load() {
            Err(OrchestratorError::UnsupportedSchema { found, .. }) => assert_eq!(found, 9),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_finding_id_in_v3_is_an_error() {
        let dir = tempdir().unwrap();
        let state = sample(&dir.path().join("runs"));
        let mut value = serde_json::to_value(&state).unwrap();
        value["phase1"]["open_findings"] = serde_json::json!(["X-1"]);
        let err = WorkflowState::decode(&value.to_string(), Path::new("state.json"), dir.path());
        assert!(err.is_err());
    }

    #[test]
    fn test_progress_accessors() {
        let mut state = sample(Path::new("runs"));
        state
            .progress_mut(WorkflowPhase::Implementation)
            .unwrap()
            .finding_history
            .insert(
                FindingId::parse("F-002").unwrap(),
                FindingRecord::with_status(FindingStatus::Closed),
            );
        assert_eq!(state.phase2.progress.finding_history.len(), 1);
        assert!(state.progress(WorkflowPhase::Done).is_none());
    }
}
