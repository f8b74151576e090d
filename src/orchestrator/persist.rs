//! Crash-safe file writes for state, checkpoints, transcripts and attempt logs.
//!
//! Every write goes to a temp file in the target's directory, is fsynced and
//! then renamed over the target, so readers see either the old or the new
//! content and never a torn file.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::errors::OrchestratorError;
use crate::util;

/// Separator placed between transcript sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn persistence(path: &Path, source: anyhow::Error) -> OrchestratorError {
    OrchestratorError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    temp.write_all(content.as_bytes())
        .context("write temp file")?;
    temp.as_file().sync_all().context("fsync temp file")?;
    temp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Atomically replace `path` with exactly `content`.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), OrchestratorError> {
    debug!(path = %path.display(), bytes = content.len(), "atomic write");
    write_atomic(path, content).map_err(|source| persistence(path, source))
}

/// Atomically write `content` trimmed, with a single trailing newline.
pub fn write_file(path: &Path, content: &str) -> Result<(), OrchestratorError> {
    atomic_write(path, &format!("{}\n", content.trim()))
}

/// Read a text artifact, trimmed. A missing file reads as empty.
pub fn read_file(path: &Path) -> Result<String, OrchestratorError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().to_string()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(persistence(
            path,
            anyhow::Error::new(err).context("read artifact"),
        )),
    }
}

/// Render one transcript section.
pub fn format_section(heading: &str, body: &str, stamp: DateTime<Utc>) -> String {
    format!(
        "## {}\n\n_Time: {}_\n\n{}\n",
        heading,
        stamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        body.trim()
    )
}

/// Append a timestamped section to a transcript. Earlier sections are kept byte for byte.
pub fn append_transcript(path: &Path, heading: &str, body: &str) -> Result<(), OrchestratorError> {
    append_section(path, heading, body, util::now())
}

fn append_section(
    path: &Path,
    heading: &str,
    body: &str,
    stamp: DateTime<Utc>,
) -> Result<(), OrchestratorError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(persistence(
                path,
                anyhow::Error::new(err).context("read transcript"),
            ));
        }
    };
    let section = format_section(heading, body, stamp);
    let next = if existing.trim().is_empty() {
        section
    } else {
        format!("{}{}{}", existing.trim_end(), SECTION_SEPARATOR, section)
    };
    atomic_write(path, &next)
}

/// Serialize a value as pretty JSON with a trailing newline.
pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize JSON")?;
    buf.push('\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        atomic_write(&path, "{}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        assert_eq!(dir_entries(&dir.path().join("nested")), vec!["state.json"]);
    }

    #[test]
    fn test_rewriting_same_content_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let value = serde_json::json!({"b": 1, "a": [1, 2, 3]});
        let content = to_pretty_json(&value).unwrap();

        atomic_write(&path, &content).unwrap();
        let first = fs::read(&path).unwrap();
        atomic_write(&path, &to_pretty_json(&value).unwrap()).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }

    #[test]
    fn test_interrupted_write_leaves_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, "old\n").unwrap();

        // A writer that dies before the rename leaves only its temp file behind,
        // which is removed when dropped.
        {
            let mut temp = tempfile::Builder::new()
                .prefix(".state.json.")
                .tempfile_in(dir.path())
                .unwrap();
            temp.write_all(b"half-writ").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert_eq!(dir_entries(dir.path()), vec!["state.json"]);
    }

    #[test]
    fn test_failed_write_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = atomic_write(&blocker.join("child.json"), "{}").unwrap_err();
        assert!(matches!(err, OrchestratorError::Persistence { .. }));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
    }

    #[test]
    fn test_write_file_normalizes_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        write_file(&path, "\n output \n\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "output\n");
    }

    #[test]
    fn test_read_file_missing_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(read_file(&dir.path().join("missing.md")).unwrap(), "");
    }

    #[test]
    fn test_transcript_sections_are_appended_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("10_phase1_plan.md");
        append_section(&path, "Cycle 1 / claude plan", "the plan\n", stamp()).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        assert_eq!(
            first,
            "## Cycle 1 / claude plan\n\n_Time: 2026-01-02T03:04:05Z_\n\nthe plan\n"
        );

        append_section(&path, "Cycle 1 / codex review", "looks fine", stamp()).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert!(second.starts_with(first.trim_end()));
        assert!(second.contains("\n\n---\n\n## Cycle 1 / codex review"));
        assert_eq!(read_file(&path).unwrap().matches("## ").count(), 2);
    }
}
