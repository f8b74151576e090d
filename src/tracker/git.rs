use anyhow::{Context, Result};
use git2::{DiffFormat, DiffOptions, DiffStatsFormat, Repository, Status, StatusOptions};
use std::path::Path;

use crate::util::TRUNCATED_MARKER;

/// Read-only view of the working tree changes, for the phase 2 reviewer.
pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::discover(project_dir).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// `git status --short` style lines, one per changed or untracked path.
    pub fn status_short(&self) -> Result<String> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("Failed to read git status")?;

        let mut lines = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            let Some(path) = entry.path() else {
                continue;
            };
            if status.is_ignored() {
                continue;
            }
            if status.contains(Status::WT_NEW) && !status.intersects(index_flags()) {
                lines.push(format!("?? {}", path));
                continue;
            }
            lines.push(format!("{}{} {}", index_code(status), worktree_code(status), path));
        }
        Ok(lines.join("\n"))
    }

    /// Unstaged changes as a `git diff --stat` style summary.
    pub fn diff_stat(&self) -> Result<String> {
        let diff = self.worktree_diff()?;
        let stats = diff.stats().context("Failed to compute diff stats")?;
        let buf = stats
            .to_buf(DiffStatsFormat::FULL, 80)
            .context("Failed to format diff stats")?;
        Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
    }

    /// Unstaged changes as a unified patch, like `git diff`.
    pub fn diff_patch(&self) -> Result<String> {
        let diff = self.worktree_diff()?;
        let mut buf = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                buf.push(line.origin() as u8);
            }
            buf.extend_from_slice(line.content());
            true
        })
        .context("Failed to render diff")?;
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    fn worktree_diff(&self) -> Result<git2::Diff<'_>> {
        let mut opts = DiffOptions::new();
        self.repo
            .diff_index_to_workdir(None, Some(&mut opts))
            .context("Failed to diff index against working tree")
    }

    /// Status, diff stats and a patch truncated to `max_diff_chars`.
    pub fn snapshot(&self, max_diff_chars: usize) -> String {
        let or_error = |result: Result<String>| match result {
            Ok(text) => text,
            Err(err) => format!("{err:#}"),
        };
        let placeholder = |text: String| {
            let text = text.trim().to_string();
            if text.is_empty() { "(empty)".to_string() } else { text }
        };

        let mut sections = vec![
            "=== git status --short ===".to_string(),
            placeholder(or_error(self.status_short())),
            "\n=== git diff --stat ===".to_string(),
            placeholder(or_error(self.diff_stat())),
            "\n=== git diff (possibly truncated) ===".to_string(),
        ];

        let raw_diff = or_error(self.diff_patch()).trim().to_string();
        if raw_diff.is_empty() {
            sections.push("(empty)".to_string());
        } else {
            sections.push(raw_diff.chars().take(max_diff_chars).collect());
            if raw_diff.chars().count() > max_diff_chars {
                sections.push(format!("\n{TRUNCATED_MARKER}"));
            }
        }
        sections.join("\n").trim().to_string()
    }
}

fn index_flags() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}

fn index_code(status: Status) -> char {
    if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    }
}

fn worktree_code(status: Status) -> char {
    if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    }
}

/// Change snapshot for `project_dir`, or an explanation when it is not a repository.
pub fn repo_snapshot(project_dir: &Path, max_diff_chars: usize) -> String {
    match GitTracker::new(project_dir) {
        Ok(tracker) => tracker.snapshot(max_diff_chars),
        Err(err) => {
            tracing::warn!(error = %err, "repository snapshot unavailable");
            format!("Repository snapshot unavailable: {err:#}")
        }
    }
}
