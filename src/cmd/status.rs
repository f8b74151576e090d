//! Run summary: `tandem status`.

use anyhow::Result;
use std::path::Path;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use tandem::config::Config;
    use tandem::orchestrator::{RunSummary, StateStore};
    use tandem::ui::WorkflowUI;

    let config = Config::new(project_dir.to_path_buf(), false)?;
    let store = StateStore::new(config.state_file.clone(), config.runs_dir.clone());

    println!();
    println!("Tandem Run Status");
    println!("=================");
    println!();

    let Some(state) = store.load()? else {
        println!("Execution: Not started");
        println!();
        println!("Run 'tandem run' to start a run.");
        println!();
        return Ok(());
    };

    println!("State:   {}", store.path().display());
    println!("Task:    {}", state.task_file.display());
    println!("Run dir: {}", state.artifacts.run_dir.display());
    println!(
        "Updated: {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    for (label, progress) in [
        ("Phase 1", &state.phase1.progress),
        ("Phase 2", &state.phase2.progress),
    ] {
        if let Some(error) = &progress.error {
            println!("{label} error: {error}");
        }
    }

    WorkflowUI::new(false).print_summary(&RunSummary::from_state(&state, tandem::util::now()));
    println!();
    Ok(())
}
