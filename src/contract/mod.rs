//! The marker-line contract between the orchestrator and its agents.
//!
//! Agents answer in free-form Markdown, but every response must carry a few
//! machine-readable lines. Keys are case-insensitive and each marker occupies
//! a whole line:
//!
//! ```text
//! CODEX_APPROVAL: YES | NO                       approval flag, key per agent
//! IMPLEMENTATION_READY: YES | NO                 readiness flag (phase 2 implementer)
//! OPEN_FINDINGS: NONE | F-001[,F-002...]         findings still open after this review
//! FINDING_STATUS: F-001 | OPEN|CLOSED | reason   one per previously open finding
//! NEW_FINDING: F-002 | summary | acceptance      one per newly opened finding
//! STATUS: DONE                                   must be the last non-blank line
//! ```
//!
//! Review responses are additionally cross-checked by [`validate_review`]:
//! `YES` requires `OPEN_FINDINGS: NONE`, `NO` requires at least one open id,
//! every previously open id needs a status line, and every newly open id needs
//! a `NEW_FINDING` declaration.
//!
//! This grammar is a wire contract: prompts teach it and persisted state
//! depends on it, so changes must stay backward compatible.

mod parser;
mod types;
mod validate;

pub use parser::{
    DONE_MARKER, format_findings_list, parse_finding_statuses, parse_flag, parse_new_findings,
    parse_open_findings, validate_done_marker,
};
pub use types::{
    Approval, FindingId, FindingRecord, FindingStatus, NewFinding, ReviewOutcome,
};
pub use validate::{review_diagnostic, validate_review};

/// Readiness flag the phase-2 implementer must emit.
pub const READY_KEY: &str = "IMPLEMENTATION_READY";

/// Approval flag key for an agent: `claude` → `CLAUDE_APPROVAL`.
pub fn approval_key(agent: &str) -> String {
    format!("{}_APPROVAL", agent.to_ascii_uppercase().replace('-', "_"))
}
