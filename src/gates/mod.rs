use std::path::Path;

use anyhow::Result;
use dialoguer::{Confirm, theme::ColorfulTheme};

/// Interactive confirmation points of a run.
///
/// With `skip_all` (`--auto`) every gate passes without asking.
pub struct ApprovalGate {
    pub skip_all: bool,
}

impl ApprovalGate {
    pub fn new(skip_all: bool) -> Self {
        Self { skip_all }
    }

    /// Ask before moving from the agreed plan to implementation.
    pub fn confirm_phase_transition(&self) -> Result<bool> {
        self.confirm("Phase 1 is approved. Start Phase 2 (implementation) now?", true)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.skip_all {
            println!("  {} (--auto)", console::style("Auto-approved").dim());
            return Ok(true);
        }
        ask(prompt, default)
    }
}

/// Ask before replacing an existing state file with a fresh run.
///
/// `--auto` does not answer this one; only `--force-overwrite-state` skips it.
pub fn confirm_overwrite(state_path: &Path) -> Result<bool> {
    ask(
        &format!(
            "Existing state at {} will be overwritten. Continue?",
            state_path.display()
        ),
        false,
    )
}

fn ask(prompt: &str, default: bool) -> Result<bool> {
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?;
    Ok(answer)
}
