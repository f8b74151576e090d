//! Contract-checked agent calls with bounded retry and quota fallback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::AgentInvoker;
use crate::contract::{DONE_MARKER, parse_flag, validate_done_marker};
use crate::errors::{InvocationError, OrchestratorError};
use crate::orchestrator::persist;
use crate::tandem_config::{AgentRegistry, OutputSettings};
use crate::ui;
use crate::util::{MAX_ERROR_CHARS, shorten};

/// Limit for the aggregated diagnostics carried by `RetriesExhausted`.
const MAX_DIAGNOSTIC_CHARS: usize = 1200;

/// Timeout used when the registry does not know the agent.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(1800);

/// Extra check on a response that already passed the marker checks.
/// Returns a diagnostic when the response is unacceptable.
pub type OutputValidator = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// One logical step: a prompt for one agent and what its answer must contain.
pub struct AgentCall {
    pub agent: String,
    pub prompt: String,
    /// Step name, used for attempt logs and error messages (`phase1-cycle2-codex-review`).
    pub log_prefix: String,
    pub max_retries: u32,
    /// Flags that must appear as `KEY: YES|NO`.
    pub required_flags: Vec<String>,
    pub validator: Option<OutputValidator>,
}

impl AgentCall {
    pub fn new(agent: &str, prompt: String, log_prefix: String, max_retries: u32) -> Self {
        Self {
            agent: agent.to_string(),
            prompt,
            log_prefix,
            max_retries,
            required_flags: Vec::new(),
            validator: None,
        }
    }

    pub fn require_flag(mut self, flag: impl Into<String>) -> Self {
        self.required_flags.push(flag.into());
        self
    }

    pub fn validate_with(mut self, validator: OutputValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// First contract deficiency of `output`, if any.
    fn diagnose(&self, output: &str) -> Option<String> {
        if !validate_done_marker(output) {
            return Some(format!(
                "missing required final completion marker '{DONE_MARKER}'"
            ));
        }
        let missing: Vec<&str> = self
            .required_flags
            .iter()
            .map(String::as_str)
            .filter(|flag| parse_flag(output, flag).is_none())
            .collect();
        if !missing.is_empty() {
            return Some(format!("missing required flags: {}", missing.join(", ")));
        }
        self.validator.as_ref().and_then(|validate| validate(output))
    }
}

/// Substring markers of quota and rate-limit failures, matched case-insensitively.
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "hit your limit",
    "you've hit your limit",
    "usage cap",
    "rate limit",
    "too many requests",
    "429",
    "insufficient credits",
    "credit balance is too low",
    "usage limit",
    "resource exhausted",
];

/// Whether an error text looks like a quota or rate-limit failure.
pub fn is_quota_or_rate_limit_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Prompt for a retry: the original prompt plus the last two diagnostics.
fn retry_prompt(prompt: &str, errors: &[String]) -> String {
    let recent = &errors[errors.len().saturating_sub(2)..];
    format!(
        "{prompt}\n\nYour previous answer was not formally acceptable. \
         Fix only the deficiencies listed below.\nError context:\n{}\n",
        recent.join("\n")
    )
}

/// Runs [`AgentCall`]s against an invoker.
pub struct AgentCaller {
    invoker: Arc<dyn AgentInvoker>,
    registry: AgentRegistry,
    output: OutputSettings,
    log_dir: PathBuf,
    allow_fallback: bool,
}

impl AgentCaller {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        registry: AgentRegistry,
        output: OutputSettings,
        log_dir: PathBuf,
        allow_fallback: bool,
    ) -> Self {
        Self {
            invoker,
            registry,
            output,
            log_dir,
            allow_fallback,
        }
    }

    async fn invoke(&self, agent: &str, prompt: &str) -> Result<String, InvocationError> {
        let timeout = self
            .registry
            .get(agent)
            .map(|definition| definition.timeout())
            .unwrap_or(FALLBACK_TIMEOUT);
        self.invoker.invoke(agent, prompt, timeout).await
    }

    /// Fallback agent to try for this failure, if fallback applies.
    fn fallback_for(&self, agent: &str, error_text: &str) -> Option<String> {
        if !self.allow_fallback || !is_quota_or_rate_limit_error(error_text) {
            return None;
        }
        self.registry.get(agent)?.fallback.clone()
    }

    /// Run `call` until a response passes every check or the attempts are used up.
    ///
    /// Raw output of each attempt is logged before validation. Only
    /// persistence failures and exhausted retries escape as errors.
    #[instrument(skip_all, fields(agent = %call.agent, step = %call.log_prefix))]
    pub async fn call(&self, call: &AgentCall) -> Result<String, OrchestratorError> {
        let attempts = call.max_retries + 1;
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=attempts {
            let prompt = if attempt == 1 {
                call.prompt.clone()
            } else {
                retry_prompt(&call.prompt, &errors)
            };

            match self.invoke(&call.agent, &prompt).await {
                Ok(output) => {
                    let log_path = self
                        .log_dir
                        .join(format!("{}.attempt-{}.log", call.log_prefix, attempt));
                    persist::write_file(&log_path, &output)?;
                    ui::print_agent_output(&self.output, &call.agent, &log_path, attempt, &output);

                    match call.diagnose(&output) {
                        None => return Ok(output),
                        Some(diagnostic) => {
                            warn!(attempt, %diagnostic, "agent output rejected");
                            errors.push(diagnostic);
                        }
                    }
                }
                Err(err) => {
                    let error_text = shorten(&err.to_string(), MAX_ERROR_CHARS);
                    warn!(attempt, error = %error_text, "agent invocation failed");
                    errors.push(error_text.clone());

                    let Some(fallback) = self.fallback_for(&call.agent, &error_text) else {
                        continue;
                    };
                    ui::print_warning(&format!(
                        "{} hit a quota or rate limit. Trying fallback agent {}.",
                        call.agent, fallback
                    ));
                    info!(attempt, %fallback, "trying fallback agent");

                    match self.invoke(&fallback, &prompt).await {
                        Ok(output) => {
                            let log_path = self.log_dir.join(format!(
                                "{}.attempt-{}.{}-fallback.log",
                                call.log_prefix, attempt, fallback
                            ));
                            persist::write_file(&log_path, &output)?;
                            ui::print_fallback(&call.agent, &fallback, attempt, &log_path);
                            ui::print_agent_output(&self.output, &fallback, &log_path, attempt, &output);

                            match call.diagnose(&output) {
                                None => return Ok(output),
                                Some(diagnostic) => {
                                    errors.push(format!("{fallback} fallback invalid output: {diagnostic}"))
                                }
                            }
                        }
                        Err(fallback_err) => errors.push(format!(
                            "{fallback} fallback failed: {}",
                            shorten(&fallback_err.to_string(), MAX_ERROR_CHARS)
                        )),
                    }
                }
            }
        }

        Err(OrchestratorError::RetriesExhausted {
            step: call.log_prefix.clone(),
            agent: call.agent.clone(),
            attempts,
            diagnostics: shorten(&errors.join("\n"), MAX_DIAGNOSTIC_CHARS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, ScriptedInvoker};
    use crate::tandem_config::AgentOutputMode;
    use tempfile::tempdir;

    fn quiet() -> OutputSettings {
        OutputSettings {
            agent_output: AgentOutputMode::None,
            ..OutputSettings::default()
        }
    }

    fn caller(invoker: &Arc<ScriptedInvoker>, log_dir: PathBuf, allow_fallback: bool) -> AgentCaller {
        AgentCaller::new(
            invoker.clone(),
            AgentRegistry::builtin(),
            quiet(),
            log_dir,
            allow_fallback,
        )
    }

    #[test]
    fn test_quota_markers() {
        assert!(is_quota_or_rate_limit_error("claude failed (exit 1): You've hit your limit"));
        assert!(is_quota_or_rate_limit_error("HTTP 429 Too Many Requests"));
        assert!(is_quota_or_rate_limit_error("Credit balance is too low"));
        assert!(!is_quota_or_rate_limit_error("claude timed out after 1800s."));
    }

    #[test]
    fn test_retry_prompt_keeps_last_two_errors() {
        let errors = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let prompt = retry_prompt("PROMPT", &errors);
        assert!(prompt.starts_with("PROMPT\n\n"));
        assert!(prompt.ends_with("two\nthree\n"));
        assert!(!prompt.contains("one"));
    }

    #[tokio::test]
    async fn test_timeout_then_success_returns_second_attempt_exactly() {
        let dir = tempdir().unwrap();
        let attempt_two = "Plan v2\nCLAUDE_APPROVAL: YES\nSTATUS: DONE";
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("claude", Reply::Timeout);
        invoker.push("claude", Reply::text(attempt_two));

        let call = AgentCall::new("claude", "Write the plan".into(), "phase1-cycle1-claude-plan".into(), 1)
            .require_flag("CLAUDE_APPROVAL");
        let output = caller(&invoker, dir.path().to_path_buf(), false)
            .call(&call)
            .await
            .unwrap();

        assert_eq!(output, attempt_two);
        let prompts = invoker.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], "Write the plan");
        assert!(prompts[1].starts_with("Write the plan\n\n"));
        assert!(prompts[1].contains("claude timed out after"));
        assert!(!dir.path().join("phase1-cycle1-claude-plan.attempt-1.log").exists());
        assert!(dir.path().join("phase1-cycle1-claude-plan.attempt-2.log").exists());
    }

    #[tokio::test]
    async fn test_contract_violation_is_retried_with_diagnostic() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("codex", Reply::text("no markers here"));
        invoker.push("codex", Reply::text("CODEX_APPROVAL: YES\nSTATUS: DONE"));

        let call = AgentCall::new("codex", "Review".into(), "step".into(), 1)
            .require_flag("CODEX_APPROVAL");
        caller(&invoker, dir.path().to_path_buf(), false)
            .call(&call)
            .await
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("step.attempt-1.log")).unwrap();
        assert_eq!(log, "no markers here\n");
        assert!(invoker.prompts()[1].contains("missing required final completion marker"));
    }

    #[tokio::test]
    async fn test_validator_runs_after_marker_checks() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("codex", Reply::text("CODEX_APPROVAL: NO\nSTATUS: DONE"));

        let call = AgentCall::new("codex", "Review".into(), "step".into(), 0)
            .require_flag("CODEX_APPROVAL")
            .validate_with(Box::new(|_| Some("custom rejection".to_string())));
        let err = caller(&invoker, dir.path().to_path_buf(), false)
            .call(&call)
            .await
            .unwrap_err();

        match err {
            OrchestratorError::RetriesExhausted {
                step,
                attempts,
                diagnostics,
                ..
            } => {
                assert_eq!(step, "step");
                assert_eq!(attempts, 1);
                assert_eq!(diagnostics, "custom rejection");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_flags_are_named() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("codex", Reply::text("IMPLEMENTATION_READY: maybe\nSTATUS: DONE"));

        let call = AgentCall::new("codex", "Implement".into(), "step".into(), 0)
            .require_flag("IMPLEMENTATION_READY");
        let err = caller(&invoker, dir.path().to_path_buf(), false)
            .call(&call)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing required flags: IMPLEMENTATION_READY"));
    }

    #[tokio::test]
    async fn test_quota_error_falls_back_when_allowed() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("claude", Reply::Fail("usage limit reached".into()));
        invoker.push("gemini", Reply::text("CLAUDE_APPROVAL: YES\nSTATUS: DONE"));

        let call = AgentCall::new("claude", "Plan".into(), "p1".into(), 0)
            .require_flag("CLAUDE_APPROVAL");
        let output = caller(&invoker, dir.path().to_path_buf(), true)
            .call(&call)
            .await
            .unwrap();

        assert!(output.starts_with("CLAUDE_APPROVAL: YES"));
        assert!(dir.path().join("p1.attempt-1.gemini-fallback.log").exists());
        assert_eq!(invoker.prompts()[1], "Plan");
    }

    #[tokio::test]
    async fn test_quota_error_without_permission_does_not_fall_back() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("claude", Reply::Fail("429 too many requests".into()));

        let call = AgentCall::new("claude", "Plan".into(), "p1".into(), 0);
        let err = caller(&invoker, dir.path().to_path_buf(), false)
            .call(&call)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::RetriesExhausted { .. }));
        assert_eq!(invoker.remaining(), 0);
        assert_eq!(invoker.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fallback_output_is_recorded() {
        let dir = tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.push("claude", Reply::Fail("quota exceeded".into()));
        invoker.push("gemini", Reply::text("no marker"));

        let call = AgentCall::new("claude", "Plan".into(), "p1".into(), 0);
        let err = caller(&invoker, dir.path().to_path_buf(), true)
            .call(&call)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gemini fallback invalid output"));
    }
}
