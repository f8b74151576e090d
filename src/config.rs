use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::tandem_config::{AgentRegistry, TandemToml};

/// Name of the per-project working directory.
pub const TANDEM_DIR: &str = ".tandem";

/// Task files looked up, in order, when `--task-file` is not given.
pub const TASK_FILE_CANDIDATES: [&str; 2] = ["TASK.md", "task.md"];

/// Runtime configuration for a tandem project.
///
/// Resolves every path under `.tandem/` and carries the parsed
/// `tandem.toml`. CLI overrides are applied by the command layer on top of
/// [`Config::toml`].
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub tandem_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub latest_run_file: PathBuf,
    pub verbose: bool,
    pub toml: TandemToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let tandem_dir = project_dir.join(TANDEM_DIR);
        let toml = TandemToml::load_or_default(&tandem_dir)?;

        Ok(Self {
            config_file: tandem_dir.join("tandem.toml"),
            state_file: tandem_dir.join("state.json"),
            log_dir: tandem_dir.join("logs"),
            checkpoint_dir: tandem_dir.join("checkpoints"),
            runs_dir: tandem_dir.join("runs"),
            latest_run_file: tandem_dir.join("LATEST_RUN.txt"),
            tandem_dir,
            project_dir,
            verbose,
            toml,
        })
    }

    pub fn registry(&self) -> AgentRegistry {
        self.toml.registry()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        std::fs::create_dir_all(&self.checkpoint_dir)
            .context("Failed to create checkpoint directory")?;
        std::fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;
        Ok(())
    }

    /// Resolve the task file: the explicit path, else the first candidate that exists.
    pub fn find_task_file(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.project_dir.join(path)
            };
            if path.exists() {
                return Ok(path);
            }
            anyhow::bail!("Task file not found: {}", path.display());
        }

        TASK_FILE_CANDIDATES
            .iter()
            .map(|candidate| self.project_dir.join(candidate))
            .find(|path| path.exists())
            .with_context(|| {
                format!(
                    "Task file missing. Expected one of: {}",
                    TASK_FILE_CANDIDATES.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_paths_under_tandem_dir() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), true).unwrap();
        let root = dir.path().canonicalize().unwrap().join(".tandem");
        assert!(config.verbose);
        assert_eq!(config.state_file, root.join("state.json"));
        assert_eq!(config.checkpoint_dir, root.join("checkpoints"));
        assert_eq!(config.latest_run_file, root.join("LATEST_RUN.txt"));
    }

    #[test]
    fn test_config_reads_toml() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".tandem")).unwrap();
        fs::write(
            dir.path().join(".tandem/tandem.toml"),
            "[roles]\nplanner = \"gemini\"\n",
        )
        .unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        assert_eq!(config.toml.roles.planner, "gemini");
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.log_dir.exists());
        assert!(config.checkpoint_dir.exists());
        assert!(config.runs_dir.exists());
    }

    #[test]
    fn test_find_task_file_discovers_candidates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("task.md"), "lower").unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        let found = config.find_task_file(None).unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "lower");

        fs::write(dir.path().join("brief.md"), "explicit").unwrap();
        let found = config.find_task_file(Some(Path::new("brief.md"))).unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "explicit");
    }

    #[test]
    fn test_find_task_file_missing() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        let err = config.find_task_file(None).unwrap_err();
        assert!(err.to_string().contains("Task file missing"));

        let err = config
            .find_task_file(Some(Path::new("nope.md")))
            .unwrap_err();
        assert!(err.to_string().contains("Task file not found"));
    }
}
