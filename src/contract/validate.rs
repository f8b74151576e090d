//! Cross-checks a reviewer response against the finding contract.

use super::parser::{parse_finding_statuses, parse_flag, parse_new_findings, parse_open_findings};
use super::types::{Approval, FindingId, ReviewOutcome};
use std::collections::{BTreeMap, HashSet};

/// Validate a review and return its parsed outcome, or a short diagnostic.
///
/// The diagnostic is meant to be fed back to the agent verbatim, so it names
/// the exact marker or id at fault.
pub fn validate_review(
    output: &str,
    previous_open: &[FindingId],
    approval_key: &str,
) -> Result<ReviewOutcome, String> {
    let approval = parse_flag(output, approval_key)
        .ok_or_else(|| format!("missing or invalid {approval_key} marker"))?;

    let raw_open =
        parse_open_findings(output).ok_or_else(|| "missing OPEN_FINDINGS marker".to_string())?;

    let mut open_findings = Vec::with_capacity(raw_open.len());
    for raw in &raw_open {
        let id = FindingId::parse(raw)
            .ok_or_else(|| format!("invalid finding id '{raw}' (expected format F-001)"))?;
        open_findings.push(id);
    }
    let unique: HashSet<&FindingId> = open_findings.iter().collect();
    if unique.len() != open_findings.len() {
        return Err("OPEN_FINDINGS contains duplicate finding ids".to_string());
    }

    match approval {
        Approval::Yes if !open_findings.is_empty() => {
            return Err(format!(
                "{approval_key}: YES is only allowed when OPEN_FINDINGS: NONE"
            ));
        }
        Approval::No if open_findings.is_empty() => {
            return Err(format!(
                "{approval_key}: NO requires at least one open finding"
            ));
        }
        _ => {}
    }

    let mut statuses = BTreeMap::new();
    for (raw, status) in parse_finding_statuses(output) {
        let id = FindingId::parse(&raw).ok_or_else(|| {
            format!("invalid finding id '{raw}' in FINDING_STATUS (expected format F-001)")
        })?;
        statuses.insert(id, status);
    }
    if let Some(missing) = previous_open.iter().find(|id| !statuses.contains_key(*id)) {
        return Err(format!(
            "missing FINDING_STATUS line for previous open finding {missing}"
        ));
    }

    let mut new_findings = BTreeMap::new();
    for (raw, finding) in parse_new_findings(output) {
        let id = FindingId::parse(&raw).ok_or_else(|| {
            format!("invalid finding id '{raw}' in NEW_FINDING (expected format F-001)")
        })?;
        new_findings.insert(id, finding);
    }
    if let Some(undeclared) = open_findings
        .iter()
        .find(|id| !previous_open.contains(id) && !new_findings.contains_key(*id))
    {
        return Err(format!(
            "new open finding {undeclared} requires NEW_FINDING: {undeclared} | <summary> | <acceptance>"
        ));
    }

    Ok(ReviewOutcome {
        approval,
        open_findings,
        statuses,
        new_findings,
    })
}

/// Diagnostic-only form of [`validate_review`], as the retry wrapper consumes it.
pub fn review_diagnostic(
    output: &str,
    previous_open: &[FindingId],
    approval_key: &str,
) -> Option<String> {
    validate_review(output, previous_open, approval_key).err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FindingStatus;

    const KEY: &str = "CODEX_APPROVAL";

    fn ids(raw: &[&str]) -> Vec<FindingId> {
        raw.iter().map(|r| FindingId::parse(r).unwrap()).collect()
    }

    #[test]
    fn accepts_clean_approval() {
        let out = "CODEX_APPROVAL: YES\nOPEN_FINDINGS: NONE\nSTATUS: DONE";
        let outcome = validate_review(out, &[], KEY).unwrap();
        assert_eq!(outcome.approval, Approval::Yes);
        assert!(outcome.open_findings.is_empty());
    }

    #[test]
    fn accepts_new_finding_with_declaration() {
        let out = "NEW_FINDING: F-001 | No error handling | Errors are propagated\n\
                   OPEN_FINDINGS: F-001\nCODEX_APPROVAL: NO\nSTATUS: DONE";
        let outcome = validate_review(out, &[], KEY).unwrap();
        assert_eq!(outcome.open_findings, ids(&["F-001"]));
        assert_eq!(outcome.new_findings.len(), 1);
    }

    #[test]
    fn rejects_missing_approval() {
        let err = validate_review("OPEN_FINDINGS: NONE", &[], KEY).unwrap_err();
        assert_eq!(err, "missing or invalid CODEX_APPROVAL marker");
    }

    #[test]
    fn rejects_missing_findings_summary() {
        let err = validate_review("CODEX_APPROVAL: YES", &[], KEY).unwrap_err();
        assert_eq!(err, "missing OPEN_FINDINGS marker");
    }

    #[test]
    fn rejects_yes_with_open_findings() {
        let out = "CODEX_APPROVAL: YES\nOPEN_FINDINGS: F-001\nNEW_FINDING: F-001 | a | b";
        let err = validate_review(out, &[], KEY).unwrap_err();
        assert!(err.contains("YES is only allowed"));
    }

    #[test]
    fn rejects_no_without_findings() {
        let out = "CODEX_APPROVAL: NO\nOPEN_FINDINGS: NONE";
        let err = validate_review(out, &[], KEY).unwrap_err();
        assert!(err.contains("NO requires at least one open finding"));
    }

    #[test]
    fn rejects_malformed_and_duplicate_ids() {
        let out = "CODEX_APPROVAL: NO\nOPEN_FINDINGS: F-1";
        assert!(validate_review(out, &[], KEY).unwrap_err().contains("invalid finding id 'F-1'"));

        let out = "CODEX_APPROVAL: NO\nOPEN_FINDINGS: F-001, f-001";
        assert_eq!(
            validate_review(out, &[], KEY).unwrap_err(),
            "OPEN_FINDINGS contains duplicate finding ids"
        );
    }

    #[test]
    fn rejects_previous_finding_without_status() {
        let out = "CODEX_APPROVAL: YES\nOPEN_FINDINGS: NONE";
        let err = validate_review(out, &ids(&["F-002"]), KEY).unwrap_err();
        assert_eq!(
            err,
            "missing FINDING_STATUS line for previous open finding F-002"
        );
    }

    #[test]
    fn rejects_undeclared_new_finding() {
        let out = "FINDING_STATUS: F-001 | OPEN | still open\n\
                   CODEX_APPROVAL: NO\nOPEN_FINDINGS: F-001, F-002";
        let err = validate_review(out, &ids(&["F-001"]), KEY).unwrap_err();
        assert!(err.starts_with("new open finding F-002 requires NEW_FINDING"));
    }

    #[test]
    fn carried_finding_needs_no_new_declaration() {
        let out = "FINDING_STATUS: F-001 | OPEN | not yet\n\
                   CODEX_APPROVAL: NO\nOPEN_FINDINGS: F-001";
        let outcome = validate_review(out, &ids(&["F-001"]), KEY).unwrap();
        assert_eq!(outcome.statuses[&ids(&["F-001"])[0]], FindingStatus::Open);
    }

    #[test]
    fn rejects_malformed_status_and_new_finding_ids() {
        let out = "FINDING_STATUS: X-9 | CLOSED | ok\nCODEX_APPROVAL: YES\nOPEN_FINDINGS: NONE";
        assert!(validate_review(out, &[], KEY).unwrap_err().contains("in FINDING_STATUS"));

        let out = "NEW_FINDING: F-9 | a | b\nCODEX_APPROVAL: YES\nOPEN_FINDINGS: NONE";
        assert!(validate_review(out, &[], KEY).unwrap_err().contains("in NEW_FINDING"));
    }

    #[test]
    fn review_diagnostic_is_none_on_success() {
        let out = "CODEX_APPROVAL: YES\nOPEN_FINDINGS: NONE";
        assert!(review_diagnostic(out, &[], KEY).is_none());
    }
}
