//! Decides which live-streamed child lines are echoed to the terminal.

use crate::tandem_config::{LiveStreamMode, StreamChannels};

/// Which pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }
}

/// Banner, diff and progress chrome a chatty CLI prints on stderr.
const NOISY_PREFIXES: &[&str] = &[
    "Reading prompt from stdin...",
    "OpenAI Codex ",
    "workdir:",
    "model:",
    "provider:",
    "approval:",
    "sandbox:",
    "reasoning effort:",
    "reasoning summaries:",
    "session id:",
    "mcp startup:",
    "--------",
    "diff --git ",
    "index ",
    "--- a/",
    "+++ b/",
    "@@",
    "deleted file mode ",
    "new file mode ",
    "file update:",
    "apply_patch(",
    "/bin/bash -lc ",
    "succeeded in ",
    "tokens used",
];

/// Per-call echo filter. Holds the prompt-echo and duplicate-suppression state.
#[derive(Debug)]
pub struct LiveStreamFilter {
    mode: LiveStreamMode,
    channels: StreamChannels,
    filter_chrome: bool,
    skip_prompt_echo: bool,
    last_emitted: String,
}

impl LiveStreamFilter {
    pub fn new(mode: LiveStreamMode, channels: StreamChannels, filter_chrome: bool) -> Self {
        Self {
            mode,
            channels,
            filter_chrome,
            skip_prompt_echo: false,
            last_emitted: String::new(),
        }
    }

    /// Whether `line` should be echoed. Updates the filter state.
    pub fn should_emit(&mut self, channel: Channel, line: &str) -> bool {
        match (self.channels, channel) {
            (StreamChannels::Stdout, Channel::Stderr) | (StreamChannels::Stderr, Channel::Stdout) => {
                return false;
            }
            _ => {}
        }
        if self.mode == LiveStreamMode::Full {
            return true;
        }

        let text = line.trim();
        if text.is_empty() {
            return false;
        }

        if self.filter_chrome && channel == Channel::Stderr && self.is_chrome(text) {
            return false;
        }

        if text == self.last_emitted {
            return false;
        }
        self.last_emitted = text.to_string();
        true
    }

    fn is_chrome(&mut self, text: &str) -> bool {
        if text == "user" {
            self.skip_prompt_echo = true;
            return true;
        }
        if self.skip_prompt_echo {
            if text.starts_with("mcp startup:") || matches!(text, "thinking" | "codex" | "exec") {
                self.skip_prompt_echo = false;
            } else {
                return true;
            }
        }

        if NOISY_PREFIXES.iter().any(|prefix| text.starts_with(prefix)) {
            return true;
        }
        if text.starts_with("202") && text.contains("ERROR codex_core::rollout::list") {
            return true;
        }
        (text.starts_with('+') || text.starts_with('-')) && text.chars().count() > 2
    }
}
