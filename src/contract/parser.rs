//! Marker-line extraction from free-form agent output.
//!
//! Every pattern is anchored to a single line (`(?m)`) and matched
//! case-insensitively (`(?i)`). Single-valued markers take the first match;
//! repeatable markers keep the last line seen per finding id.

use super::types::{Approval, FindingStatus, NewFinding};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Exact literal the last non-blank line of every response must equal.
pub const DONE_MARKER: &str = "STATUS: DONE";

static OPEN_FINDINGS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*OPEN_FINDINGS[ \t]*:[ \t]*(.+?)[ \t]*\r?$").unwrap());

static FINDING_STATUS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*FINDING_STATUS[ \t]*:[ \t]*([A-Za-z0-9_-]+)[ \t]*\|[ \t]*(OPEN|CLOSED)[ \t]*\|.+$",
    )
    .unwrap()
});

static NEW_FINDING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*NEW_FINDING[ \t]*:[ \t]*([A-Za-z0-9_-]+)[ \t]*\|[ \t]*(.+?)[ \t]*\|[ \t]*(.+?)[ \t]*\r?$",
    )
    .unwrap()
});

/// Whether the last non-blank line is exactly [`DONE_MARKER`].
pub fn validate_done_marker(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .is_some_and(|line| line == DONE_MARKER)
}

/// Read a `KEY: YES|NO` flag.
pub fn parse_flag(text: &str, key: &str) -> Option<Approval> {
    let pattern = format!(
        r"(?im)^[ \t]*{}[ \t]*:[ \t]*(YES|NO)[ \t]*\r?$",
        regex::escape(key)
    );
    // The key is escaped, so the pattern is always valid.
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| Approval::parse(m.as_str()))
}

/// Read the `OPEN_FINDINGS:` summary.
///
/// Returns `None` when the marker is missing, an empty list for `NONE`, and
/// otherwise the comma-separated ids, trimmed and uppercased, in order.
/// Ids are not validated here.
pub fn parse_open_findings(text: &str) -> Option<Vec<String>> {
    let raw = OPEN_FINDINGS_REGEX.captures(text)?.get(1)?.as_str().trim();
    if raw.eq_ignore_ascii_case("NONE") {
        return Some(Vec::new());
    }
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_uppercase)
            .collect(),
    )
}

/// Collect every `FINDING_STATUS: <id> | OPEN|CLOSED | <reason>` line.
pub fn parse_finding_statuses(text: &str) -> BTreeMap<String, FindingStatus> {
    let mut statuses = BTreeMap::new();
    for cap in FINDING_STATUS_REGEX.captures_iter(text) {
        let id = cap[1].trim().to_ascii_uppercase();
        if let Some(status) = FindingStatus::parse(&cap[2]) {
            statuses.insert(id, status);
        }
    }
    statuses
}

/// Collect every `NEW_FINDING: <id> | <summary> | <acceptance>` line.
pub fn parse_new_findings(text: &str) -> BTreeMap<String, NewFinding> {
    let mut found = BTreeMap::new();
    for cap in NEW_FINDING_REGEX.captures_iter(text) {
        let id = cap[1].trim().to_ascii_uppercase();
        found.insert(
            id.clone(),
            NewFinding {
                id,
                summary: cap[2].trim().to_string(),
                acceptance: cap[3].trim().to_string(),
            },
        );
    }
    found
}

/// Render a finding list for prompts and log lines: `NONE` or `F-001, F-002`.
pub fn format_findings_list<T: AsRef<str>>(ids: &[T]) -> String {
    if ids.is_empty() {
        return "NONE".to_string();
    }
    ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}
