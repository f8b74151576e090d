//! Aggregate numbers for the end-of-run report and `tandem status`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::state::WorkflowState;
use crate::contract::{FindingId, FindingStatus};
use crate::util::format_duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub duration: String,
    pub phase: String,
    pub phase1_status: String,
    pub phase2_status: String,
    pub phase1_cycles: u32,
    pub phase2_cycles: u32,
    pub closed_findings: usize,
    pub open_findings: usize,
}

impl RunSummary {
    /// Summarize `state` as of `now`.
    ///
    /// A finding id counts once across both phases. An id that is open in
    /// any history entry or open list counts as open, never as closed.
    pub fn from_state(state: &WorkflowState, now: DateTime<Utc>) -> Self {
        let mut open: BTreeSet<&FindingId> = BTreeSet::new();
        let mut closed: BTreeSet<&FindingId> = BTreeSet::new();

        for progress in [&state.phase1.progress, &state.phase2.progress] {
            for (id, record) in &progress.finding_history {
                match record.status {
                    FindingStatus::Open => open.insert(id),
                    FindingStatus::Closed => closed.insert(id),
                };
            }
            open.extend(progress.open_findings.iter());
        }
        closed.retain(|id| !open.contains(id));

        Self {
            run_id: state.run_id.clone(),
            duration: format_duration((now - state.started_at).num_seconds()),
            phase: state.phase.to_string(),
            phase1_status: state.phase1.progress.status.to_string(),
            phase2_status: state.phase2.progress.status.to_string(),
            phase1_cycles: state.phase1.progress.cycle,
            phase2_cycles: state.phase2.progress.cycle,
            closed_findings: closed.len(),
            open_findings: open.len(),
        }
    }
}
