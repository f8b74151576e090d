//! Upgrade of schema-2 state files.
//!
//! Schema 2 stored agent-named approval flags (`codex_approval`,
//! `claude_approval`), plain path strings, and finding history values that
//! are either a status word or `"summary | acceptance"`. Ids that are not
//! well-formed are dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use super::state::{
    ArtifactPaths, ImplementationState, PhaseProgress, PhaseStatus, PlanningState,
    SCHEMA_VERSION, WorkflowPhase, WorkflowState,
};
use crate::contract::{Approval, FindingId, FindingRecord, FindingStatus};
use crate::util;

pub const LEGACY_VERSION: u64 = 2;

#[derive(Debug, Deserialize)]
struct LegacyState {
    #[serde(default)]
    task_file: Option<String>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    artifacts: LegacyArtifacts,
    phase1: LegacyPhase,
    phase2: LegacyPhase,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyArtifacts {
    run_id: Option<String>,
    run_dir: Option<String>,
    task: Option<String>,
    phase1_shared: Option<String>,
    phase2_shared: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyPhase {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cycle: u32,
    #[serde(default)]
    max_cycles: Option<u32>,
    #[serde(default)]
    codex_approval: Option<String>,
    #[serde(default)]
    claude_approval: Option<String>,
    #[serde(default)]
    implementation_ready: Option<String>,
    #[serde(default)]
    last_test_exit: Option<i32>,
    #[serde(default)]
    open_findings: Vec<serde_json::Value>,
    #[serde(default)]
    finding_history: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            // Naive timestamps were written as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        }
    }
}

fn approval(raw: Option<&str>) -> Approval {
    raw.and_then(Approval::parse).unwrap_or(Approval::No)
}

fn status(raw: Option<&str>) -> PhaseStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("running") => PhaseStatus::Running,
        Some("completed") => PhaseStatus::Completed,
        Some("failed") => PhaseStatus::Failed,
        _ => PhaseStatus::Pending,
    }
}

/// A v2 history value: a status word, or `summary | acceptance` for an opened finding.
fn history_record(value: &serde_json::Value) -> Option<FindingRecord> {
    let text = value.as_str()?.trim();
    if let Some(status) = FindingStatus::parse(text) {
        return Some(FindingRecord::with_status(status));
    }
    let (summary, acceptance) = text.split_once('|')?;
    Some(FindingRecord::open(summary.trim(), acceptance.trim()))
}

fn progress(legacy: &LegacyPhase, default_max_cycles: u32) -> PhaseProgress {
    let mut open_findings: Vec<FindingId> = Vec::new();
    for raw in &legacy.open_findings {
        match raw.as_str().and_then(FindingId::parse) {
            Some(id) if !open_findings.contains(&id) => open_findings.push(id),
            Some(_) => {}
            None => warn!(value = %raw, "dropping malformed open finding id"),
        }
    }

    let mut finding_history = BTreeMap::new();
    for (raw_id, value) in &legacy.finding_history {
        let Some(id) = FindingId::parse(raw_id) else {
            warn!(id = %raw_id, "dropping malformed finding history id");
            continue;
        };
        match history_record(value) {
            Some(record) => {
                finding_history.insert(id, record);
            }
            None => warn!(id = %raw_id, "dropping unreadable finding history entry"),
        }
    }

    PhaseProgress {
        status: status(legacy.status.as_deref()),
        cycle: legacy.cycle,
        max_cycles: legacy.max_cycles.unwrap_or(default_max_cycles),
        open_findings,
        finding_history,
        error: legacy.error.clone(),
        completed_at: timestamp(legacy.completed_at.as_deref()),
    }
}

/// Convert a schema-2 document into the current layout.
///
/// Missing run artifacts get a fresh run id under `runs_dir`.
pub fn from_v2(value: &serde_json::Value, runs_dir: &Path) -> Result<WorkflowState> {
    let legacy: LegacyState =
        serde_json::from_value(value.clone()).context("state does not match schema 2")?;

    let (run_id, artifacts) = match legacy.artifacts.run_id.clone() {
        Some(run_id) if !run_id.trim().is_empty() => {
            let defaults = ArtifactPaths::new(runs_dir, &run_id);
            let path_or = |raw: &Option<String>, default: PathBuf| {
                raw.as_ref().map(PathBuf::from).unwrap_or(default)
            };
            let artifacts = ArtifactPaths {
                run_dir: path_or(&legacy.artifacts.run_dir, defaults.run_dir.clone()),
                task: path_or(&legacy.artifacts.task, defaults.task.clone()),
                phase1_transcript: path_or(
                    &legacy.artifacts.phase1_shared,
                    defaults.phase1_transcript.clone(),
                ),
                phase2_transcript: path_or(
                    &legacy.artifacts.phase2_shared,
                    defaults.phase2_transcript.clone(),
                ),
            };
            (run_id, artifacts)
        }
        _ => {
            let run_id = util::new_run_id();
            let artifacts = ArtifactPaths::new(runs_dir, &run_id);
            (run_id, artifacts)
        }
    };

    let phase = match legacy.phase.as_deref() {
        Some("phase2") => WorkflowPhase::Implementation,
        Some("done") => WorkflowPhase::Done,
        _ => WorkflowPhase::Planning,
    };

    let now = util::now();
    let started_at = timestamp(legacy.started_at.as_deref()).unwrap_or(now);
    let updated_at = timestamp(legacy.updated_at.as_deref()).unwrap_or(now);

    Ok(WorkflowState {
        schema_version: SCHEMA_VERSION,
        run_id,
        task_file: PathBuf::from(legacy.task_file.unwrap_or_else(|| "TASK.md".to_string())),
        phase,
        artifacts,
        phase1: PlanningState {
            progress: progress(&legacy.phase1, 4),
            reviewer_approval: approval(legacy.phase1.codex_approval.as_deref()),
            planner_approval: approval(legacy.phase1.claude_approval.as_deref()),
        },
        phase2: ImplementationState {
            progress: progress(&legacy.phase2, 6),
            implementation_ready: approval(legacy.phase2.implementation_ready.as_deref()),
            reviewer_approval: approval(legacy.phase2.claude_approval.as_deref()),
            last_test_exit: legacy.phase2.last_test_exit,
        },
        started_at,
        updated_at,
    })
}
