//! Value types carried by the marker-line contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A `YES`/`NO` flag emitted by an agent (`CLAUDE_APPROVAL: YES`, `IMPLEMENTATION_READY: NO`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Approval {
    Yes,
    #[default]
    No,
}

impl Approval {
    pub fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }

    /// Parse a flag value, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "YES" => Some(Self::Yes),
            "NO" => Some(Self::No),
            _ => None,
        }
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Lifecycle status of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingStatus {
    Open,
    Closed,
}

impl FindingStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A well-formed finding identifier: `F-` followed by exactly three ASCII digits.
///
/// Construction always uppercases, so `f-007` and `F-007` are the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FindingId(String);

impl FindingId {
    pub fn parse(raw: &str) -> Option<Self> {
        let id = raw.trim().to_ascii_uppercase();
        is_well_formed(&id).then_some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_well_formed(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 5 && id.starts_with("F-") && bytes[2..].iter().all(u8::is_ascii_digit)
}

impl TryFrom<String> for FindingId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid finding id '{}'", value))
    }
}

impl From<FindingId> for String {
    fn from(id: FindingId) -> Self {
        id.0
    }
}

impl AsRef<str> for FindingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `NEW_FINDING: <id> | <summary> | <acceptance>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFinding {
    pub id: String,
    pub summary: String,
    pub acceptance: String,
}

/// Last known state of a finding, as kept in a phase's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub status: FindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance: Option<String>,
}

impl FindingRecord {
    pub fn open(summary: impl Into<String>, acceptance: impl Into<String>) -> Self {
        Self {
            status: FindingStatus::Open,
            summary: Some(summary.into()),
            acceptance: Some(acceptance.into()),
        }
    }

    pub fn with_status(status: FindingStatus) -> Self {
        Self {
            status,
            summary: None,
            acceptance: None,
        }
    }
}

/// A reviewer response that passed every contract cross-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub approval: Approval,
    pub open_findings: Vec<FindingId>,
    pub statuses: BTreeMap<FindingId, FindingStatus>,
    pub new_findings: BTreeMap<FindingId, NewFinding>,
}

impl ReviewOutcome {
    /// Fold this review into a finding history.
    ///
    /// Status lines update the status of known findings; new-finding declarations
    /// (re)open a finding with its summary and acceptance criterion.
    pub fn merge_into(&self, history: &mut BTreeMap<FindingId, FindingRecord>) {
        for (id, status) in &self.statuses {
            history
                .entry(id.clone())
                .and_modify(|record| record.status = *status)
                .or_insert_with(|| FindingRecord::with_status(*status));
        }
        for (id, finding) in &self.new_findings {
            history.insert(
                id.clone(),
                FindingRecord::open(finding.summary.clone(), finding.acceptance.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_id_normalizes_case() {
        let id = FindingId::parse(" f-012 ").unwrap();
        assert_eq!(id.as_str(), "F-012");
    }

    #[test]
    fn finding_id_rejects_malformed() {
        for raw in ["F-12", "F-1234", "G-001", "F001", "F-0a1", "", "F-٠٠١"] {
            assert!(FindingId::parse(raw).is_none(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn finding_id_serde_rejects_malformed() {
        let ok: FindingId = serde_json::from_str("\"F-001\"").unwrap();
        assert_eq!(ok.as_str(), "F-001");
        assert!(serde_json::from_str::<FindingId>("\"X-1\"").is_err());
    }

    #[test]
    fn approval_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Approval::Yes).unwrap(), "\"YES\"");
        assert_eq!(Approval::parse("no"), Some(Approval::No));
        assert_eq!(Approval::parse("maybe"), None);
    }

    #[test]
    fn merge_keeps_summary_when_closing() {
        let id = FindingId::parse("F-001").unwrap();
        let mut history = BTreeMap::new();
        history.insert(id.clone(), FindingRecord::open("missing tests", "cargo test passes"));

        let outcome = ReviewOutcome {
            approval: Approval::Yes,
            open_findings: vec![],
            statuses: BTreeMap::from([(id.clone(), FindingStatus::Closed)]),
            new_findings: BTreeMap::new(),
        };
        outcome.merge_into(&mut history);

        let record = &history[&id];
        assert_eq!(record.status, FindingStatus::Closed);
        assert_eq!(record.summary.as_deref(), Some("missing tests"));
    }
}
