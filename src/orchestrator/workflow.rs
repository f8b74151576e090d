//! The two-phase review workflow.
//!
//! Phase 1 (planning), per cycle: planner plan, reviewer review, planner
//! confirmation. Phase 2 (implementation), per cycle: the reviewer agent
//! implements, the test command runs, the planner agent reviews.
//!
//! State is saved after every mutation and checkpointed before every cycle.
//! Each phase's agent outputs are appended to its transcript.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::checkpoint::CheckpointStore;
use super::persist;
use super::prompts::{self, ReviewEvidence, StepContext};
use super::state::{PhaseStatus, StateStore, WorkflowPhase, WorkflowState};
use crate::contract::{
    Approval, FindingId, READY_KEY, ReviewOutcome, approval_key, format_findings_list, parse_flag,
    review_diagnostic, validate_review,
};
use crate::errors::OrchestratorError;
use crate::runtime::{AgentCall, AgentCaller};
use crate::tandem_config::RolesSection;
use crate::tracker::WorkspaceProbe;
use crate::ui::WorkflowUI;
use crate::util;

const PLANNING_EXHAUSTED: &str = "Phase 1 reached max cycles without dual approval.";
const IMPLEMENTATION_EXHAUSTED: &str = "Phase 2 reached max cycles without approval/pass condition.";

pub struct Workflow {
    caller: AgentCaller,
    probe: Arc<dyn WorkspaceProbe>,
    store: StateStore,
    checkpoints: CheckpointStore,
    roles: RolesSection,
    max_retries: u32,
    ui: WorkflowUI,
}

impl Workflow {
    pub fn new(
        caller: AgentCaller,
        probe: Arc<dyn WorkspaceProbe>,
        store: StateStore,
        checkpoints: CheckpointStore,
        roles: RolesSection,
        max_retries: u32,
        ui: WorkflowUI,
    ) -> Self {
        Self {
            caller,
            probe,
            store,
            checkpoints,
            roles,
            max_retries,
            ui,
        }
    }

    fn save(&self, state: &mut WorkflowState) -> Result<(), OrchestratorError> {
        state.touch();
        self.store.save(state)
    }

    /// Run one agent step. Exhausted retries are recorded in the phase before aborting.
    async fn call_step(
        &self,
        state: &mut WorkflowState,
        phase: WorkflowPhase,
        call: AgentCall,
    ) -> Result<String, OrchestratorError> {
        self.ui.detail(&format!("calling {} ({})", call.agent, call.log_prefix));
        match self.caller.call(&call).await {
            Ok(output) => Ok(output),
            Err(err @ OrchestratorError::RetriesExhausted { .. }) => {
                warn!(step = %call.log_prefix, "agent step failed");
                if let Some(progress) = state.progress_mut(phase) {
                    progress.error = Some(err.to_string());
                }
                self.save(state)?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Validator for a review step, bound to the previous open list.
    fn review_call(
        &self,
        agent: &str,
        prompt: String,
        log_prefix: String,
        previous_open: &[FindingId],
        key: &str,
    ) -> AgentCall {
        let previous = previous_open.to_vec();
        let key_owned = key.to_string();
        AgentCall::new(agent, prompt, log_prefix, self.max_retries)
            .require_flag(key)
            .validate_with(Box::new(move |output| {
                review_diagnostic(output, &previous, &key_owned)
            }))
    }

    /// Re-derive the outcome of a review that already passed its validator.
    fn review_outcome(
        phase: WorkflowPhase,
        output: &str,
        previous_open: &[FindingId],
        key: &str,
    ) -> Result<ReviewOutcome, OrchestratorError> {
        validate_review(output, previous_open, key)
            .map_err(|reason| OrchestratorError::PhaseFailed { phase, reason })
    }

    fn fail_phase(
        &self,
        state: &mut WorkflowState,
        phase: WorkflowPhase,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        if let Some(progress) = state.progress_mut(phase) {
            progress.status = PhaseStatus::Failed;
            progress.error = Some(reason.to_string());
        }
        self.save(state)?;
        self.ui.phase_failed(phase, reason);
        Err(OrchestratorError::PhaseFailed {
            phase,
            reason: reason.to_string(),
        })
    }

    /// Checkpoint, then open cycle `cycle` of `phase`.
    fn begin_cycle(
        &self,
        state: &mut WorkflowState,
        phase: WorkflowPhase,
        cycle: u32,
    ) -> Result<(), OrchestratorError> {
        self.checkpoints.save(phase, cycle, state)?;
        if let Some(progress) = state.progress_mut(phase) {
            progress.cycle = cycle;
            progress.error = None;
        }
        self.save(state)
    }

    /// Drive phase 1 until both agents approve or the cycle budget runs out.
    #[instrument(skip_all, fields(phase = "phase1"))]
    pub async fn run_planning(
        &self,
        state: &mut WorkflowState,
        task: &str,
    ) -> Result<(), OrchestratorError> {
        let phase = WorkflowPhase::Planning;
        state.phase1.progress.status = PhaseStatus::Running;
        state.phase = phase;
        self.save(state)?;

        let planner = self.roles.planner.clone();
        let reviewer = self.roles.reviewer.clone();
        let planner_key = approval_key(&planner);
        let reviewer_key = approval_key(&reviewer);
        let transcript_path = state.artifacts.phase1_transcript.clone();
        let start = state.phase1.progress.cycle + 1;
        let max_cycles = state.phase1.progress.max_cycles;
        self.ui
            .print_phase_header(phase, "planning", start, max_cycles);

        for cycle in start..=max_cycles {
            self.begin_cycle(state, phase, cycle)?;
            info!(cycle, "planning cycle started");
            let previous_open = state.phase1.progress.open_findings.clone();
            let previous_block = format_findings_list(&previous_open);

            self.ui.step(phase, cycle, max_cycles, &format!("{planner} plan"));
            let transcript = persist::read_file(&transcript_path)?;
            let ctx = StepContext {
                task,
                transcript: &transcript,
                cycle,
            };
            let call = AgentCall::new(
                &planner,
                prompts::planning_plan(ctx, &previous_block, &planner_key),
                format!("phase1-cycle{cycle}-{planner}-plan"),
                self.max_retries,
            )
            .require_flag(&planner_key);
            let plan = self.call_step(state, phase, call).await?;
            append(&transcript_path, phase, cycle, &format!("{planner} plan"), &plan)?;

            self.ui.step(phase, cycle, max_cycles, &format!("{reviewer} review"));
            let transcript = persist::read_file(&transcript_path)?;
            let ctx = StepContext {
                task,
                transcript: &transcript,
                cycle,
            };
            let call = self.review_call(
                &reviewer,
                prompts::planning_review(ctx, &previous_block, &reviewer_key),
                format!("phase1-cycle{cycle}-{reviewer}-review"),
                &previous_open,
                &reviewer_key,
            );
            let review = self.call_step(state, phase, call).await?;
            append(&transcript_path, phase, cycle, &format!("{reviewer} review"), &review)?;

            let outcome = Self::review_outcome(phase, &review, &previous_open, &reviewer_key)?;
            state.phase1.progress.open_findings = outcome.open_findings.clone();
            outcome.merge_into(&mut state.phase1.progress.finding_history);
            self.save(state)?;
            let open_block = format_findings_list(&outcome.open_findings);

            self.ui.step(phase, cycle, max_cycles, &format!("{planner} confirmation"));
            let transcript = persist::read_file(&transcript_path)?;
            let ctx = StepContext {
                task,
                transcript: &transcript,
                cycle,
            };
            let call = AgentCall::new(
                &planner,
                prompts::planning_confirm(ctx, &open_block, &reviewer_key, outcome.approval, &planner_key),
                format!("phase1-cycle{cycle}-{planner}-confirm"),
                self.max_retries,
            )
            .require_flag(&planner_key);
            let confirm = self.call_step(state, phase, call).await?;
            append(&transcript_path, phase, cycle, &format!("{planner} confirmation"), &confirm)?;

            let mut planner_approval = parse_flag(&confirm, &planner_key).unwrap_or(Approval::No);
            let reviewer_blocks = !outcome.approval.is_yes() || !outcome.open_findings.is_empty();
            if reviewer_blocks && planner_approval.is_yes() {
                warn!(cycle, "planner approval overridden to NO");
                self.ui.override_warning(&planner, &reviewer);
                planner_approval = Approval::No;
            }

            state.phase1.reviewer_approval = outcome.approval;
            state.phase1.planner_approval = planner_approval;
            self.save(state)?;

            if outcome.approval.is_yes() && planner_approval.is_yes() {
                state.phase1.progress.status = PhaseStatus::Completed;
                state.phase1.progress.completed_at = Some(util::now());
                state.phase = WorkflowPhase::Implementation;
                self.save(state)?;
                info!(cycle, "planning approved");
                self.ui.phase_complete(
                    phase,
                    &format!("both {planner} and {reviewer} approved the plan."),
                );
                return Ok(());
            }

            self.ui.cycle_not_approved(
                phase,
                &format!(
                    "{reviewer_key}={}, {planner_key}={}, OPEN_FINDINGS={open_block}",
                    outcome.approval, planner_approval
                ),
            );
        }

        self.fail_phase(state, phase, PLANNING_EXHAUSTED)
    }

    /// Drive phase 2 until the implementation is ready, tests pass and the review approves.
    #[instrument(skip_all, fields(phase = "phase2"))]
    pub async fn run_implementation(
        &self,
        state: &mut WorkflowState,
        task: &str,
        plan: &str,
    ) -> Result<(), OrchestratorError> {
        let phase = WorkflowPhase::Implementation;
        state.phase2.progress.status = PhaseStatus::Running;
        state.phase = phase;
        self.save(state)?;

        // Roles swap: the plan reviewer implements, the planner reviews.
        let implementer = self.roles.reviewer.clone();
        let reviewer = self.roles.planner.clone();
        let reviewer_key = approval_key(&reviewer);
        let transcript_path = state.artifacts.phase2_transcript.clone();
        let start = state.phase2.progress.cycle + 1;
        let max_cycles = state.phase2.progress.max_cycles;
        self.ui
            .print_phase_header(phase, "implementation", start, max_cycles);

        for cycle in start..=max_cycles {
            self.begin_cycle(state, phase, cycle)?;
            info!(cycle, "implementation cycle started");
            let previous_open = state.phase2.progress.open_findings.clone();
            let previous_block = format_findings_list(&previous_open);

            self.ui
                .step(phase, cycle, max_cycles, &format!("{implementer} implementation"));
            let transcript = persist::read_file(&transcript_path)?;
            let ctx = StepContext {
                task,
                transcript: &transcript,
                cycle,
            };
            let call = AgentCall::new(
                &implementer,
                prompts::implementation(ctx, plan, &previous_block),
                format!("phase2-cycle{cycle}-{implementer}-implement"),
                self.max_retries,
            )
            .require_flag(READY_KEY);
            let report = self.call_step(state, phase, call).await?;
            append(
                &transcript_path,
                phase,
                cycle,
                &format!("{implementer} implementation"),
                &report,
            )?;

            self.ui.step(phase, cycle, max_cycles, "test snapshot");
            let tests = self.probe.run_tests().await;
            info!(cycle, exit_code = tests.exit_code, "test command finished");
            state.phase2.last_test_exit = Some(tests.exit_code);
            self.save(state)?;
            append(&transcript_path, phase, cycle, "Orchestrator tests", &tests.report)?;

            self.ui.step(phase, cycle, max_cycles, &format!("{reviewer} review"));
            let transcript = persist::read_file(&transcript_path)?;
            let repo_snapshot = self.probe.repo_snapshot();
            let ctx = StepContext {
                task,
                transcript: &transcript,
                cycle,
            };
            let evidence = ReviewEvidence {
                plan,
                test_snapshot: &tests.report,
                repo_snapshot: &repo_snapshot,
            };
            let call = self.review_call(
                &reviewer,
                prompts::implementation_review(ctx, evidence, &previous_block, &reviewer_key),
                format!("phase2-cycle{cycle}-{reviewer}-review"),
                &previous_open,
                &reviewer_key,
            );
            let review = self.call_step(state, phase, call).await?;
            append(&transcript_path, phase, cycle, &format!("{reviewer} review"), &review)?;

            let outcome = Self::review_outcome(phase, &review, &previous_open, &reviewer_key)?;
            let ready = parse_flag(&report, READY_KEY).unwrap_or(Approval::No);
            state.phase2.progress.open_findings = outcome.open_findings.clone();
            outcome.merge_into(&mut state.phase2.progress.finding_history);
            state.phase2.implementation_ready = ready;
            state.phase2.reviewer_approval = outcome.approval;
            self.save(state)?;

            if ready.is_yes() && tests.passed() && outcome.approval.is_yes() {
                state.phase2.progress.status = PhaseStatus::Completed;
                state.phase2.progress.completed_at = Some(util::now());
                state.phase = WorkflowPhase::Done;
                self.save(state)?;
                info!(cycle, "implementation approved");
                self.ui
                    .phase_complete(phase, "implementation approved and tests passed.");
                return Ok(());
            }

            self.ui.cycle_not_approved(
                phase,
                &format!(
                    "{READY_KEY}={ready}, test_exit={}, {reviewer_key}={}, OPEN_FINDINGS={}",
                    tests.exit_code,
                    outcome.approval,
                    format_findings_list(&outcome.open_findings)
                ),
            );
        }

        self.fail_phase(state, phase, IMPLEMENTATION_EXHAUSTED)
    }
}

fn append(
    transcript: &Path,
    phase: WorkflowPhase,
    cycle: u32,
    what: &str,
    body: &str,
) -> Result<(), OrchestratorError> {
    let label = match phase {
        WorkflowPhase::Planning => "Phase 1",
        _ => "Phase 2",
    };
    persist::append_transcript(transcript, &format!("{label} / Cycle {cycle} / {what}"), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tandem_config::{AgentOutputMode, AgentRegistry, OutputSettings};
    use crate::test_support::{Reply, ScriptedInvoker, ScriptedProbe};
    use tempfile::TempDir;

    const PLAN_YES: &str = "## Plan\n1. Parse flags\nCLAUDE_APPROVAL: YES\nSTATUS: DONE";
    const REVIEW_F001: &str = "## Findings\nNEW_FINDING: F-001 | No test for --json | A test covers --json output\n\
                               OPEN_FINDINGS: F-001\nCODEX_APPROVAL: NO\nSTATUS: DONE";
    const CONFIRM_YES: &str = "Looks ready to me.\nCLAUDE_APPROVAL: YES\nSTATUS: DONE";
    const REVIEW_CLOSE_F001: &str = "FINDING_STATUS: F-001 | CLOSED | test added to plan\n\
                                     OPEN_FINDINGS: NONE\nCODEX_APPROVAL: YES\nSTATUS: DONE";
    const IMPL_READY: &str = "Changed src/main.rs\nIMPLEMENTATION_READY: YES\nSTATUS: DONE";
    const REVIEW2_YES: &str = "No findings.\nOPEN_FINDINGS: NONE\nCLAUDE_APPROVAL: YES\nSTATUS: DONE";

    struct Harness {
        dir: TempDir,
        invoker: Arc<ScriptedInvoker>,
        probe: Arc<ScriptedProbe>,
        store: StateStore,
        checkpoints: CheckpointStore,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = StateStore::new(dir.path().join("state.json"), dir.path().join("runs"));
            let checkpoints =
                CheckpointStore::new(dir.path().join("checkpoints"), dir.path().join("runs"));
            Self {
                dir,
                invoker: Arc::new(ScriptedInvoker::new()),
                probe: Arc::new(ScriptedProbe::new()),
                store,
                checkpoints,
            }
        }

        fn state(&self, phase1_cycles: u32, phase2_cycles: u32) -> WorkflowState {
            WorkflowState::new(
                Path::new("TASK.md"),
                &self.dir.path().join("runs"),
                "test-run".into(),
                phase1_cycles,
                phase2_cycles,
            )
        }

        fn workflow(&self, max_retries: u32) -> Workflow {
            let output = OutputSettings {
                agent_output: AgentOutputMode::None,
                ..OutputSettings::default()
            };
            let caller = AgentCaller::new(
                self.invoker.clone(),
                AgentRegistry::builtin(),
                output,
                self.dir.path().join("logs"),
                false,
            );
            Workflow::new(
                caller,
                self.probe.clone(),
                self.store.clone(),
                self.checkpoints.clone(),
                RolesSection::default(),
                max_retries,
                WorkflowUI::new(false),
            )
        }
    }

    fn id(raw: &str) -> FindingId {
        FindingId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_reviewer_findings_force_confirmation_to_no_then_close() {
        let h = Harness::new();
        h.invoker.push("claude", Reply::text(PLAN_YES));
        h.invoker.push("codex", Reply::text(REVIEW_F001));
        h.invoker.push("claude", Reply::text(CONFIRM_YES));
        h.invoker.push("claude", Reply::text(PLAN_YES));
        h.invoker.push("codex", Reply::text(REVIEW_CLOSE_F001));
        h.invoker.push("claude", Reply::text(CONFIRM_YES));

        let mut state = h.state(3, 2);
        h.workflow(0).run_planning(&mut state, "Add --json").await.unwrap();

        // State entering cycle 2 is the state cycle 1 left behind.
        let after_first = h
            .checkpoints
            .load(WorkflowPhase::Planning, 2)
            .unwrap()
            .unwrap();
        assert_eq!(after_first.phase1.progress.status, PhaseStatus::Running);
        assert_eq!(after_first.phase1.progress.cycle, 1);
        assert_eq!(after_first.phase1.progress.open_findings, vec![id("F-001")]);
        assert_eq!(after_first.phase1.reviewer_approval, Approval::No);
        assert_eq!(after_first.phase1.planner_approval, Approval::No);

        assert_eq!(state.phase1.progress.status, PhaseStatus::Completed);
        assert_eq!(state.phase1.progress.cycle, 2);
        assert!(state.phase1.progress.open_findings.is_empty());
        assert_eq!(state.phase, WorkflowPhase::Implementation);
        assert!(state.phase1.progress.completed_at.is_some());
        let record = &state.phase1.progress.finding_history[&id("F-001")];
        assert_eq!(record.status, crate::contract::FindingStatus::Closed);
        assert_eq!(record.summary.as_deref(), Some("No test for --json"));

        assert_eq!(h.store.load().unwrap().unwrap(), state);
        assert_eq!(h.invoker.remaining(), 0);

        let transcript = persist::read_file(&state.artifacts.phase1_transcript).unwrap();
        assert_eq!(transcript.matches("## Phase 1 / Cycle ").count(), 6);
        assert!(transcript.contains("## Phase 1 / Cycle 2 / codex review"));
    }

    #[tokio::test]
    async fn test_second_cycle_review_prompt_lists_previous_findings() {
        let h = Harness::new();
        for reply in [PLAN_YES, REVIEW_F001, CONFIRM_YES, PLAN_YES, REVIEW_CLOSE_F001, CONFIRM_YES] {
            let agent = if reply.contains("CODEX_APPROVAL") { "codex" } else { "claude" };
            h.invoker.push(agent, Reply::text(reply));
        }
        let mut state = h.state(2, 2);
        h.workflow(0).run_planning(&mut state, "task").await.unwrap();

        let calls = h.invoker.calls();
        let (agent, review_prompt) = &calls[4];
        assert_eq!(agent, "codex");
        assert!(review_prompt.contains("Open findings from the PREVIOUS cycle:\n---\nF-001\n---"));
        let (_, confirm_prompt) = &calls[2];
        assert!(confirm_prompt.contains("- CODEX_APPROVAL: NO\n- OPEN_FINDINGS: F-001"));
    }

    #[tokio::test]
    async fn test_planning_budget_exhaustion_fails_phase() {
        let h = Harness::new();
        h.invoker.push("claude", Reply::text(PLAN_YES));
        h.invoker.push("codex", Reply::text(REVIEW_F001));
        h.invoker.push("claude", Reply::text(CONFIRM_YES));

        let mut state = h.state(1, 2);
        let err = h.workflow(0).run_planning(&mut state, "task").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PhaseFailed { phase: WorkflowPhase::Planning, .. }));

        let saved = h.store.load().unwrap().unwrap();
        assert_eq!(saved.phase1.progress.status, PhaseStatus::Failed);
        assert_eq!(saved.phase1.progress.error.as_deref(), Some(PLANNING_EXHAUSTED));
    }

    #[tokio::test]
    async fn test_failing_tests_block_completion() {
        let h = Harness::new();
        h.probe.push_exit(1);
        h.probe.push_exit(0);
        for _ in 0..2 {
            h.invoker.push("codex", Reply::text(IMPL_READY));
            h.invoker.push("claude", Reply::text(REVIEW2_YES));
        }

        let mut state = h.state(2, 3);
        h.workflow(0)
            .run_implementation(&mut state, "task", "the plan")
            .await
            .unwrap();

        let after_first = h
            .checkpoints
            .load(WorkflowPhase::Implementation, 2)
            .unwrap()
            .unwrap();
        assert_eq!(after_first.phase2.progress.status, PhaseStatus::Running);
        assert_eq!(after_first.phase2.last_test_exit, Some(1));
        assert_eq!(after_first.phase2.implementation_ready, Approval::Yes);
        assert_eq!(after_first.phase2.reviewer_approval, Approval::Yes);

        assert_eq!(state.phase2.progress.status, PhaseStatus::Completed);
        assert_eq!(state.phase2.progress.cycle, 2);
        assert_eq!(state.phase2.last_test_exit, Some(0));
        assert_eq!(state.phase, WorkflowPhase::Done);

        let calls = h.invoker.calls();
        assert_eq!(calls[0].0, "codex");
        assert!(calls[0].1.contains("Final agreed plan from PHASE 1:\n---\nthe plan\n---"));
        assert!(calls[1].1.contains("Local test snapshot:\n---\nExit code: 1"));
        assert!(calls[1].1.contains("Repository snapshot:\n---\n=== git status --short ==="));

        let transcript = persist::read_file(&state.artifacts.phase2_transcript).unwrap();
        assert!(transcript.contains("## Phase 2 / Cycle 1 / Orchestrator tests"));
    }

    #[tokio::test]
    async fn test_not_ready_blocks_completion_until_budget() {
        let h = Harness::new();
        h.invoker.push(
            "codex",
            Reply::text("Half done\nIMPLEMENTATION_READY: NO\nSTATUS: DONE"),
        );
        h.invoker.push("claude", Reply::text(REVIEW2_YES));

        let mut state = h.state(2, 1);
        let err = h
            .workflow(0)
            .run_implementation(&mut state, "task", "plan")
            .await
            .unwrap_err();
        assert!(err.to_string().contains(IMPLEMENTATION_EXHAUSTED));
        assert_eq!(state.phase2.progress.status, PhaseStatus::Failed);
        assert_eq!(state.phase, WorkflowPhase::Implementation);
    }

    #[tokio::test]
    async fn test_resume_after_interruption_restores_cycle_checkpoint() {
        let h = Harness::new();
        h.invoker.push("claude", Reply::text(PLAN_YES));
        h.invoker.push("codex", Reply::Timeout);

        let mut state = h.state(2, 2);
        let err = h.workflow(0).run_planning(&mut state, "task").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::RetriesExhausted { .. }));

        // The interrupted cycle left its marks in the persisted state.
        let persisted = h.store.load().unwrap().unwrap();
        assert_eq!(persisted.phase1.progress.cycle, 1);
        assert!(
            persisted
                .phase1
                .progress
                .error
                .as_deref()
                .unwrap()
                .contains("phase1-cycle1-codex-review")
        );

        let checkpoint = h
            .checkpoints
            .load(WorkflowPhase::Planning, 1)
            .unwrap()
            .unwrap();
        let mut recovered = h.checkpoints.recover(persisted).unwrap();
        assert_eq!(recovered, checkpoint);
        assert_eq!(recovered.phase1.progress.cycle, 0);
        assert!(recovered.phase1.progress.error.is_none());

        h.invoker.push("claude", Reply::text(PLAN_YES));
        h.invoker.push(
            "codex",
            Reply::text("OPEN_FINDINGS: NONE\nCODEX_APPROVAL: YES\nSTATUS: DONE"),
        );
        h.invoker.push("claude", Reply::text(CONFIRM_YES));
        h.workflow(0)
            .run_planning(&mut recovered, "task")
            .await
            .unwrap();

        assert_eq!(recovered.phase1.progress.cycle, 1);
        assert_eq!(recovered.phase1.progress.status, PhaseStatus::Completed);
        let prompts = h.invoker.prompts();
        assert!(prompts[2].contains("PHASE 1 (planning), cycle 1."));
    }
}
