//! The external test command run once per implementation cycle.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::tandem_config::TestsSection;
use crate::util::shorten;

/// Exit code and the report appended to the implementation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSnapshot {
    pub exit_code: i32,
    pub report: String,
}

impl TestSnapshot {
    fn failed(report: String) -> Self {
        Self {
            exit_code: 1,
            report,
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run the configured test command in `project_dir`.
///
/// Never fails: a missing executable, a launch error or a timeout all yield
/// exit code 1 with an explanatory report.
pub async fn run_tests(project_dir: &Path, tests: &TestsSection) -> TestSnapshot {
    let Some((program, args)) = tests.command.split_first() else {
        return TestSnapshot::failed("No test command configured.".to_string());
    };
    if which::which(program).is_err() {
        warn!(program = %program, "test command not found");
        return TestSnapshot::failed(format!("{program} not available in PATH."));
    }

    info!(command = %tests.command.join(" "), "running test command");
    let child = Command::new(program)
        .args(args)
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(err) => return TestSnapshot::failed(format!("Failed to launch {program}: {err}")),
    };

    let timeout = Duration::from_secs(tests.timeout_secs);
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return TestSnapshot::failed(format!("Failed to wait for {program}: {err}"));
        }
        Err(_) => {
            warn!(seconds = tests.timeout_secs, "test command timed out");
            return TestSnapshot::failed(format!(
                "Exit code: 1\nTest command timed out after {}s.",
                tests.timeout_secs
            ));
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    TestSnapshot {
        exit_code,
        report: format!(
            "Exit code: {exit_code}\n{}",
            shorten(combined.trim(), tests.max_output_chars)
        ),
    }
}

/// Snapshot used when tests are simulated.
pub fn dry_run_snapshot() -> TestSnapshot {
    TestSnapshot {
        exit_code: 0,
        report: "Exit code: 0\n[dry-run] test command simulated.".to_string(),
    }
}
