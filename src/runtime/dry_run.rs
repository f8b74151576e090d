//! Invoker that answers every prompt without spawning an agent.
//!
//! The reply satisfies whatever markers the prompt asks for, so a dry run
//! walks the full workflow with approvals on the first cycle.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::AgentInvoker;
use crate::contract::{DONE_MARKER, READY_KEY};
use crate::errors::InvocationError;

static APPROVAL_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9_]*_APPROVAL)\b").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunInvoker;

impl DryRunInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Simulated response for `prompt`.
    pub fn reply(agent: &str, prompt: &str) -> String {
        let mut lines = vec![
            format!("# Dry Run Output ({agent})"),
            String::new(),
            "This response was simulated by the orchestrator.".to_string(),
        ];

        let mut keys: Vec<&str> = Vec::new();
        for cap in APPROVAL_KEY_REGEX.captures_iter(prompt) {
            let key = cap.get(1).map_or("", |m| m.as_str());
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        lines.extend(keys.iter().map(|key| format!("{key}: YES")));

        if prompt.contains("OPEN_FINDINGS") {
            lines.push("OPEN_FINDINGS: NONE".to_string());
        }
        if prompt.contains(READY_KEY) {
            lines.push(format!("{READY_KEY}: YES"));
        }
        lines.push(DONE_MARKER.to_string());
        lines.join("\n")
    }
}

#[async_trait]
impl AgentInvoker for DryRunInvoker {
    async fn invoke(
        &self,
        agent: &str,
        prompt: &str,
        _timeout: Duration,
    ) -> Result<String, InvocationError> {
        tracing::info!(agent, "dry run: simulating agent response");
        Ok(Self::reply(agent, prompt))
    }
}
