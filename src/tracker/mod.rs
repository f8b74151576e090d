//! What the workflow observes about the project between agent calls.
//!
//! [`WorkspaceProbe`] is the seam: [`LocalWorkspace`] runs the real test
//! command and reads git, tests script both.

pub mod checks;
pub mod git;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::tandem_config::TestsSection;

pub use checks::TestSnapshot;
pub use git::GitTracker;

#[async_trait]
pub trait WorkspaceProbe: Send + Sync {
    /// Run the project's tests once.
    async fn run_tests(&self) -> TestSnapshot;

    /// Status, diff stats and truncated diff of the working tree.
    fn repo_snapshot(&self) -> String;
}

/// Probe for the project on disk.
pub struct LocalWorkspace {
    project_dir: PathBuf,
    tests: TestsSection,
    max_diff_chars: usize,
    dry_run: bool,
}

impl LocalWorkspace {
    pub fn new(
        project_dir: PathBuf,
        tests: TestsSection,
        max_diff_chars: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            project_dir,
            tests,
            max_diff_chars,
            dry_run,
        }
    }
}

#[async_trait]
impl WorkspaceProbe for LocalWorkspace {
    async fn run_tests(&self) -> TestSnapshot {
        if self.dry_run {
            return checks::dry_run_snapshot();
        }
        checks::run_tests(&self.project_dir, &self.tests).await
    }

    fn repo_snapshot(&self) -> String {
        git::repo_snapshot(&self.project_dir, self.max_diff_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_never_runs_the_command() {
        let tests = TestsSection {
            command: vec!["tandem-missing-test-runner".to_string()],
            ..TestsSection::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let probe = LocalWorkspace::new(dir.path().to_path_buf(), tests, 100, true);
        let snapshot = probe.run_tests().await;
        assert_eq!(snapshot.exit_code, 0);
        assert!(snapshot.report.contains("[dry-run]"));
    }
}
