//! File-level configuration for tandem, read from `.tandem/tandem.toml`.
//!
//! Every section is optional; missing keys fall back to built-in defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! max_agent_retries = 1
//! phase1_max_cycles = 4
//! phase2_max_cycles = 6
//! strict_preflight = false
//! allow_fallback = false
//!
//! [roles]
//! planner = "claude"
//! reviewer = "codex"
//!
//! [output]
//! agent_output = "summary"
//! agent_output_max_chars = 1800
//! live_stream = false
//! live_stream_mode = "compact"
//! live_stream_channels = "both"
//!
//! [tests]
//! command = ["npm", "test"]
//! timeout_secs = 300
//! max_output_chars = 7000
//!
//! [snapshot]
//! max_diff_chars = 14000
//!
//! [agents.claude]
//! command = ["claude", "-p", "--output-format", "text", "--model", "sonnet"]
//! fallback = "gemini"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Smallest accepted `agent_output_max_chars`.
pub const MIN_AGENT_OUTPUT_CHARS: usize = 200;

/// How an agent receives its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptDelivery {
    /// Written to the child's stdin, which is then closed.
    #[default]
    Stdin,
    /// Appended as the last command-line argument.
    Argument,
}

/// One agent CLI the orchestrator can drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Executable followed by its fixed arguments.
    pub command: Vec<String>,
    #[serde(default)]
    pub prompt_delivery: PromptDelivery,
    /// Environment overrides applied on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
    /// Hosts that must resolve for the agent to be usable.
    #[serde(default)]
    pub required_hosts: Vec<String>,
    /// Flag that makes the CLI write its final message to a file, e.g. `--output-last-message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_message_flag: Option<String>,
    /// Agent to try once when this one reports a quota or rate limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Drop the CLI's banner and diff chrome from compact live streams (stderr only).
    #[serde(default)]
    pub filter_stderr_chrome: bool,
}

fn default_agent_timeout() -> u64 {
    1800
}

impl AgentDefinition {
    /// The executable, i.e. the first word of `command`.
    pub fn executable(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn builtin(command: &[&str], hosts: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            prompt_delivery: PromptDelivery::Stdin,
            env: BTreeMap::from([("NO_COLOR".to_string(), "1".to_string())]),
            timeout_secs: default_agent_timeout(),
            required_hosts: hosts.iter().map(|s| s.to_string()).collect(),
            final_message_flag: None,
            fallback: None,
            filter_stderr_chrome: false,
        }
    }
}

/// The set of agents known to a run, keyed by agent key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentRegistry {
    /// The built-in `codex`, `claude` and `gemini` definitions.
    pub fn builtin() -> Self {
        let mut codex = AgentDefinition::builtin(
            &[
                "codex",
                "exec",
                "--skip-git-repo-check",
                "--sandbox",
                "workspace-write",
                "--color",
                "never",
            ],
            &["chatgpt.com", "api.openai.com"],
        );
        codex.final_message_flag = Some("--output-last-message".to_string());
        codex.filter_stderr_chrome = true;

        let mut claude = AgentDefinition::builtin(
            &[
                "claude",
                "-p",
                "--output-format",
                "text",
                "--no-session-persistence",
                "--model",
                "opus",
            ],
            &["api.anthropic.com"],
        );
        claude.fallback = Some("gemini".to_string());

        let mut gemini =
            AgentDefinition::builtin(&["gemini", "-p"], &["generativelanguage.googleapis.com"]);
        gemini.prompt_delivery = PromptDelivery::Argument;

        Self {
            agents: BTreeMap::from([
                ("codex".to_string(), codex),
                ("claude".to_string(), claude),
                ("gemini".to_string(), gemini),
            ]),
        }
    }

    /// Built-ins with `[agents.<key>]` entries replacing or extending them.
    pub fn with_overrides(overrides: &BTreeMap<String, AgentDefinition>) -> Self {
        let mut registry = Self::builtin();
        for (key, definition) in overrides {
            registry.agents.insert(key.clone(), definition.clone());
        }
        registry
    }

    pub fn get(&self, key: &str) -> Option<&AgentDefinition> {
        self.agents.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, key: &str, definition: AgentDefinition) {
        self.agents.insert(key.to_string(), definition);
    }
}

/// Workflow defaults that CLI flags can override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_max_agent_retries")]
    pub max_agent_retries: u32,
    #[serde(default = "default_phase1_max_cycles")]
    pub phase1_max_cycles: u32,
    #[serde(default = "default_phase2_max_cycles")]
    pub phase2_max_cycles: u32,
    /// Fail preflight when a required host does not resolve.
    #[serde(default)]
    pub strict_preflight: bool,
    /// Allow one fallback attempt on quota or rate-limit errors.
    #[serde(default)]
    pub allow_fallback: bool,
}

fn default_max_agent_retries() -> u32 {
    1
}

fn default_phase1_max_cycles() -> u32 {
    4
}

fn default_phase2_max_cycles() -> u32 {
    6
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            max_agent_retries: default_max_agent_retries(),
            phase1_max_cycles: default_phase1_max_cycles(),
            phase2_max_cycles: default_phase2_max_cycles(),
            strict_preflight: false,
            allow_fallback: false,
        }
    }
}

/// Which agent plays which part. Phase 2 swaps them: the reviewer implements
/// and the planner reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesSection {
    #[serde(default = "default_planner")]
    pub planner: String,
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
}

fn default_planner() -> String {
    "claude".to_string()
}

fn default_reviewer() -> String {
    "codex".to_string()
}

impl Default for RolesSection {
    fn default() -> Self {
        Self {
            planner: default_planner(),
            reviewer: default_reviewer(),
        }
    }
}

/// How much of each agent response is echoed after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgentOutputMode {
    None,
    #[default]
    Summary,
    Full,
}

/// Live-stream verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LiveStreamMode {
    #[default]
    Compact,
    Full,
}

/// Which child streams are echoed while live streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamChannels {
    #[default]
    Both,
    Stdout,
    Stderr,
}

/// The `[output]` section. Also passed as-is to the process runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub agent_output: AgentOutputMode,
    #[serde(default = "default_agent_output_max_chars")]
    pub agent_output_max_chars: usize,
    #[serde(default)]
    pub live_stream: bool,
    #[serde(default)]
    pub live_stream_mode: LiveStreamMode,
    #[serde(default)]
    pub live_stream_channels: StreamChannels,
}

fn default_agent_output_max_chars() -> usize {
    1800
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            agent_output: AgentOutputMode::default(),
            agent_output_max_chars: default_agent_output_max_chars(),
            live_stream: false,
            live_stream_mode: LiveStreamMode::default(),
            live_stream_channels: StreamChannels::default(),
        }
    }
}

impl OutputSettings {
    /// Summary-mode limit, clamped to [`MIN_AGENT_OUTPUT_CHARS`].
    pub fn summary_limit(&self) -> usize {
        self.agent_output_max_chars.max(MIN_AGENT_OUTPUT_CHARS)
    }
}

/// External test command run once per implementation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestsSection {
    #[serde(default = "default_test_command")]
    pub command: Vec<String>,
    #[serde(default = "default_test_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_test_output_chars")]
    pub max_output_chars: usize,
}

fn default_test_command() -> Vec<String> {
    vec!["npm".to_string(), "test".to_string()]
}

fn default_test_timeout() -> u64 {
    300
}

fn default_test_output_chars() -> usize {
    7000
}

impl Default for TestsSection {
    fn default() -> Self {
        Self {
            command: default_test_command(),
            timeout_secs: default_test_timeout(),
            max_output_chars: default_test_output_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSection {
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
}

fn default_max_diff_chars() -> usize {
    14000
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            max_diff_chars: default_max_diff_chars(),
        }
    }
}

/// The complete tandem.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TandemToml {
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub roles: RolesSection,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub tests: TestsSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    /// Agent definitions replacing or extending the built-ins.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, AgentDefinition>,
}

impl TandemToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse tandem.toml")
    }

    /// Load `.tandem/tandem.toml`, or defaults when the file does not exist.
    pub fn load_or_default(tandem_dir: &Path) -> Result<Self> {
        let config_path = tandem_dir.join("tandem.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize tandem.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Built-in agents merged with this file's `[agents]` entries.
    pub fn registry(&self) -> AgentRegistry {
        AgentRegistry::with_overrides(&self.agents)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let registry = self.registry();

        for (role, key) in [
            ("planner", &self.roles.planner),
            ("reviewer", &self.roles.reviewer),
        ] {
            if registry.get(key).is_none() {
                warnings.push(format!("Role '{}' refers to unknown agent '{}'", role, key));
            }
        }
        if self.roles.planner == self.roles.reviewer {
            warnings.push(format!(
                "Planner and reviewer are the same agent '{}'",
                self.roles.planner
            ));
        }

        for (key, agent) in &self.agents {
            if agent.command.is_empty() {
                warnings.push(format!("Agent '{}' has an empty command", key));
            }
            if let Some(fallback) = &agent.fallback
                && registry.get(fallback).is_none()
            {
                warnings.push(format!(
                    "Agent '{}' falls back to unknown agent '{}'",
                    key, fallback
                ));
            }
        }

        if self.output.agent_output_max_chars < MIN_AGENT_OUTPUT_CHARS {
            warnings.push(format!(
                "agent_output_max_chars {} is below the minimum {} and will be raised",
                self.output.agent_output_max_chars, MIN_AGENT_OUTPUT_CHARS
            ));
        }
        if self.tests.command.is_empty() {
            warnings.push("[tests] command is empty".to_string());
        }

        warnings
    }
}
