//! Cycle-boundary snapshots of the workflow state.
//!
//! A checkpoint is taken right before a cycle's first action and written once
//! per `(phase, cycle)`. Recovery restores the checkpoint of the cycle that
//! was interrupted, so the whole cycle is redone from a clean state.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::persist;
use super::state::{PhaseStatus, WorkflowPhase, WorkflowState};
use crate::errors::OrchestratorError;
use crate::ui;

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    runs_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: PathBuf, runs_dir: PathBuf) -> Self {
        Self { dir, runs_dir }
    }

    pub fn path(&self, phase: WorkflowPhase, cycle: u32) -> PathBuf {
        self.dir.join(format!("{}-cycle-{}.json", phase, cycle))
    }

    /// Snapshot `state` for `(phase, cycle)` unless that key was already written.
    pub fn save(
        &self,
        phase: WorkflowPhase,
        cycle: u32,
        state: &WorkflowState,
    ) -> Result<PathBuf, OrchestratorError> {
        let path = self.path(phase, cycle);
        if path.exists() {
            debug!(path = %path.display(), "checkpoint already written");
            return Ok(path);
        }
        let content = state
            .encode()
            .map_err(|source| OrchestratorError::Persistence {
                path: path.clone(),
                source,
            })?;
        persist::atomic_write(&path, &content)?;
        info!(path = %path.display(), %phase, cycle, "checkpoint saved");
        ui::print_checkpoint(&path);
        Ok(path)
    }

    pub fn load(
        &self,
        phase: WorkflowPhase,
        cycle: u32,
    ) -> Result<Option<WorkflowState>, OrchestratorError> {
        let path = self.path(phase, cycle);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(OrchestratorError::Persistence {
                    path,
                    source: anyhow::Error::new(err).context("read checkpoint"),
                });
            }
        };
        WorkflowState::decode(&content, &path, &self.runs_dir).map(Some)
    }

    /// Roll an interrupted cycle back to its checkpoint.
    ///
    /// Applies only when the current phase is running with a started cycle.
    /// A missing checkpoint keeps `state` as it is.
    pub fn recover(&self, state: WorkflowState) -> Result<WorkflowState, OrchestratorError> {
        let phase = state.phase;
        let Some(progress) = state.progress(phase) else {
            return Ok(state);
        };
        if progress.status != PhaseStatus::Running || progress.cycle == 0 {
            return Ok(state);
        }
        let cycle = progress.cycle;

        match self.load(phase, cycle)? {
            Some(recovered) => {
                info!(%phase, cycle, "restored checkpoint");
                ui::print_recovery(&format!("restored checkpoint for {phase} cycle={cycle}."));
                Ok(recovered)
            }
            None => {
                let path = self.path(phase, cycle);
                warn!(path = %path.display(), "no checkpoint to recover from");
                ui::print_recovery(&format!(
                    "no checkpoint found at {}; continuing without rollback.",
                    path.display()
                ));
                Ok(state)
            }
        }
    }

    /// Remove every checkpoint. Used when a fresh run replaces the state.
    pub fn clear(&self) -> Result<(), OrchestratorError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(self.persistence(&self.dir, err)),
        };
        for entry in entries {
            let path = entry.map_err(|err| self.persistence(&self.dir, err))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path).map_err(|err| self.persistence(&path, err))?;
            }
        }
        Ok(())
    }

    fn persistence(&self, path: &Path, err: std::io::Error) -> OrchestratorError {
        OrchestratorError::Persistence {
            path: path.to_path_buf(),
            source: anyhow::Error::new(err).context("clear checkpoints"),
        }
    }
}
