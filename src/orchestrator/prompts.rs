//! Prompt templates for the five workflow steps.
//!
//! Templates are plain text substitution. The marker lines they ask for are
//! the ones [`crate::contract`] checks.

use crate::contract::{Approval, DONE_MARKER, READY_KEY};

/// Inputs every step prompt shares.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub task: &'a str,
    /// Current phase transcript.
    pub transcript: &'a str,
    pub cycle: u32,
}

fn or_empty(text: &str) -> &str {
    if text.trim().is_empty() { "(empty)" } else { text }
}

fn fenced(prompt: &mut String, title: &str, body: &str) {
    prompt.push_str(&format!("{title}:\n---\n{body}\n---\n\n"));
}

/// The review contract block, with the decision rule for `approval_key`.
fn review_contract(approval_key: &str) -> String {
    format!(
        "CONTRACT (mandatory):\n\
         - One line for EVERY previously open finding:\n  \
           FINDING_STATUS: <ID> | OPEN|CLOSED | <short reason>\n\
         - One line for every NEW open finding:\n  \
           NEW_FINDING: <ID> | <short description> | <acceptance test>\n\
         - Summary:\n  \
           OPEN_FINDINGS: NONE\n  \
           or\n  \
           OPEN_FINDINGS: <ID1,ID2,...>\n\
         - Decision rule:\n  \
           {approval_key}: YES ONLY if OPEN_FINDINGS: NONE\n  \
           {approval_key}: NO ONLY if OPEN_FINDINGS is not empty\n\
         - ID format is mandatory: F-001, F-002, ...\n\n"
    )
}

fn closing(prompt: &mut String, sections: &str, marker_key: &str, with_contract: bool) {
    prompt.push_str("Output format (Markdown):\n");
    prompt.push_str(&format!("- Sections: {sections}\n"));
    if with_contract {
        prompt.push_str("- CONTRACT lines as above\n");
    }
    prompt.push_str(&format!(
        "- Marker line: {marker_key}: YES or {marker_key}: NO\n"
    ));
    prompt.push_str(&format!("- The last line MUST be exactly: {DONE_MARKER}"));
}

/// Phase 1, step 1: the planner writes or revises the plan.
pub fn planning_plan(ctx: StepContext<'_>, open_block: &str, planner_key: &str) -> String {
    let mut prompt = format!(
        "You are the planner. This is PHASE 1 (planning), cycle {}.\n\n",
        ctx.cycle
    );
    fenced(&mut prompt, "Task", ctx.task);
    fenced(&mut prompt, "Shared plan file (history so far)", or_empty(ctx.transcript));
    fenced(&mut prompt, "Findings still open from the last review", open_block);
    prompt.push_str(
        "Goal:\n\
         - Write or revise the implementation plan so that every open finding is closed.\n\
         - Do not add side work that is not needed to close findings or fulfil the task.\n\n",
    );
    prompt.push_str("Output format (Markdown):\n");
    prompt.push_str(
        "- Sections: Plan status, Work packages, Acceptance criteria, Risks, Test strategy, Open questions\n",
    );
    prompt.push_str("- Marker line: ADDRESSED_FINDINGS: <ID1,ID2,...> or NONE\n");
    prompt.push_str(&format!(
        "- Marker line: {planner_key}: YES or {planner_key}: NO\n"
    ));
    prompt.push_str(&format!("- The last line MUST be exactly: {DONE_MARKER}"));
    prompt
}

/// Phase 1, step 2: the reviewer audits the plan under the contract.
pub fn planning_review(ctx: StepContext<'_>, previous_open_block: &str, reviewer_key: &str) -> String {
    let mut prompt = format!(
        "You are the plan reviewer. This is PHASE 1 (plan review), cycle {}.\n\n",
        ctx.cycle
    );
    fenced(&mut prompt, "Task", ctx.task);
    fenced(&mut prompt, "Shared plan file (planner output and history)", ctx.transcript);
    fenced(&mut prompt, "Open findings from the PREVIOUS cycle", previous_open_block);
    prompt.push_str(
        "Tasks:\n\
         1) Check the plan for gaps, feasibility and testability.\n\
         2) Close previous findings explicitly or keep them open, with a short reason.\n\
         3) Raise new findings ONLY if they are blocking.\n\
         4) Give a clear approval decision according to the CONTRACT.\n\n",
    );
    prompt.push_str(&review_contract(reviewer_key));
    closing(
        &mut prompt,
        "Findings, Required changes, Consolidated plan",
        reviewer_key,
        true,
    );
    prompt
}

/// Phase 1, step 3: the planner confirms given the review's verdict.
pub fn planning_confirm(
    ctx: StepContext<'_>,
    open_block: &str,
    reviewer_key: &str,
    reviewer_approval: Approval,
    planner_key: &str,
) -> String {
    let mut prompt = format!(
        "You are the planner. Final confirmation for PHASE 1, cycle {}.\n\n",
        ctx.cycle
    );
    fenced(&mut prompt, "Task", ctx.task);
    fenced(&mut prompt, "Shared plan file including the current review", ctx.transcript);
    prompt.push_str(&format!(
        "Review contract in this cycle:\n\
         - {reviewer_key}: {reviewer_approval}\n\
         - OPEN_FINDINGS: {open_block}\n\n"
    ));
    prompt.push_str(&format!(
        "Tasks:\n\
         1) Decide whether the current plan is ready for implementation.\n\
         2) If not, list the required changes for the next cycle.\n\
         3) If {reviewer_key}=NO or OPEN_FINDINGS is not empty, you MUST set {planner_key} to NO.\n\n"
    ));
    closing(&mut prompt, "Decision, Reasoning, Next required changes", planner_key, false);
    prompt
}

/// Phase 2, step 1: the implementer changes the repository.
pub fn implementation(ctx: StepContext<'_>, plan: &str, open_block: &str) -> String {
    let mut prompt = format!(
        "You are the implementer in this repository. This is PHASE 2, cycle {}.\n\n",
        ctx.cycle
    );
    fenced(&mut prompt, "Task", ctx.task);
    fenced(&mut prompt, "Final agreed plan from PHASE 1", plan);
    fenced(
        &mut prompt,
        "Shared implementation file (history including review findings)",
        or_empty(ctx.transcript),
    );
    fenced(&mut prompt, "Open review findings from the PREVIOUS cycle", open_block);
    prompt.push_str(
        "Assignment:\n\
         1) Implement or fix in the repository according to the plan and the findings so far.\n\
         2) Address the open review findings explicitly.\n\
         3) Summarize the applied changes briefly.\n\n",
    );
    closing(
        &mut prompt,
        "Summary, Changed files, Applied fixes, Remaining items",
        READY_KEY,
        false,
    );
    prompt
}

/// Inputs specific to the phase 2 review.
#[derive(Debug, Clone, Copy)]
pub struct ReviewEvidence<'a> {
    pub plan: &'a str,
    pub test_snapshot: &'a str,
    pub repo_snapshot: &'a str,
}

/// Phase 2, step 3: the reviewer inspects implementation, tests and diff.
pub fn implementation_review(
    ctx: StepContext<'_>,
    evidence: ReviewEvidence<'_>,
    previous_open_block: &str,
    reviewer_key: &str,
) -> String {
    let mut prompt = format!(
        "You are the implementation reviewer. This is the PHASE 2 review, cycle {}.\n\n",
        ctx.cycle
    );
    fenced(&mut prompt, "Task", ctx.task);
    fenced(&mut prompt, "Agreed plan from PHASE 1", evidence.plan);
    fenced(&mut prompt, "Shared implementation file", ctx.transcript);
    fenced(&mut prompt, "Local test snapshot", evidence.test_snapshot);
    fenced(&mut prompt, "Repository snapshot", evidence.repo_snapshot);
    fenced(&mut prompt, "Open findings from the PREVIOUS cycle", previous_open_block);
    prompt.push_str(
        "Tasks:\n\
         1) Check that the task is fulfilled and the plan is followed.\n\
         2) Find bugs, regressions, security or maintenance risks and test gaps.\n\
         3) If the result cannot be approved, name concrete required fixes for the next cycle.\n\n",
    );
    prompt.push_str(&review_contract(reviewer_key));
    closing(&mut prompt, "Findings, Required fixes, Approval", reviewer_key, true);
    prompt
}
