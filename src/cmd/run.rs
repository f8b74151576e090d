//! The two-phase pipeline: `tandem run`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use tandem::config::Config;
use tandem::orchestrator::{CheckpointStore, StateStore, WorkflowState};
use tandem::tandem_config::TandemToml;

use super::super::{Cli, RunArgs};

/// Apply CLI flags on top of the file configuration.
pub fn apply_overrides(toml: &mut TandemToml, args: &RunArgs) {
    let defaults = &mut toml.defaults;
    if let Some(retries) = args.max_agent_retries {
        defaults.max_agent_retries = retries;
    }
    if let Some(cycles) = args.phase1_max_cycles {
        defaults.phase1_max_cycles = cycles;
    }
    if let Some(cycles) = args.phase2_max_cycles {
        defaults.phase2_max_cycles = cycles;
    }
    defaults.strict_preflight |= args.strict_preflight;
    defaults.allow_fallback |= args.allow_fallback;

    let output = &mut toml.output;
    if let Some(mode) = args.agent_output {
        output.agent_output = mode;
    }
    if let Some(chars) = args.agent_output_max_chars {
        output.agent_output_max_chars = chars;
    }
    output.live_stream |= args.agent_live_stream;
    if let Some(mode) = args.agent_live_stream_mode {
        output.live_stream_mode = mode;
    }
    if let Some(channels) = args.agent_live_stream_channels {
        output.live_stream_channels = channels;
    }
}

/// A timestamp run id whose directory does not exist yet.
fn unique_run_id(runs_dir: &std::path::Path) -> String {
    let base = tandem::util::new_run_id();
    let mut candidate = base.clone();
    let mut n = 2;
    while runs_dir.join(&candidate).exists() {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}

/// Load the persisted state for `--resume`, or create a fresh one.
///
/// Returns `None` when the operator declines to overwrite an existing state.
fn prepare_state(
    config: &Config,
    args: &RunArgs,
    store: &StateStore,
    checkpoints: &CheckpointStore,
    task_file: &std::path::Path,
) -> Result<Option<WorkflowState>> {
    use tandem::gates::confirm_overwrite;
    use tandem::ui;

    let defaults = &config.toml.defaults;
    if args.resume
        && let Some(mut state) = store.load()?
    {
        if !args.no_recover {
            state = checkpoints.recover(state)?;
        }
        // Explicit budgets on the command line win over the persisted ones.
        if let Some(cycles) = args.phase1_max_cycles {
            state.phase1.progress.max_cycles = cycles;
        }
        if let Some(cycles) = args.phase2_max_cycles {
            state.phase2.progress.max_cycles = cycles;
        }
        state.touch();
        store.save(&state)?;
        ui::print_info(&format!("Loaded state from {}", store.path().display()));
        return Ok(Some(state));
    }

    if args.resume {
        ui::print_warning(&format!(
            "No state at {}; starting a fresh run.",
            store.path().display()
        ));
    } else if store.exists()
        && !args.force_overwrite_state
        && !confirm_overwrite(store.path())?
    {
        ui::print_info("Use --resume to continue the existing run.");
        return Ok(None);
    }

    checkpoints.clear()?;
    let state = WorkflowState::new(
        task_file,
        &config.runs_dir,
        unique_run_id(&config.runs_dir),
        defaults.phase1_max_cycles,
        defaults.phase2_max_cycles,
    );
    store.save(&state)?;
    ui::print_info(&format!("Initialized new state at {}", store.path().display()));
    Ok(Some(state))
}

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, args: &RunArgs) -> Result<()> {
    use tandem::gates::ApprovalGate;
    use tandem::orchestrator::{RunSummary, Workflow, persist};
    use tandem::runtime::{AgentCaller, AgentInvoker, DryRunInvoker, ProcessRuntime, preflight};
    use tandem::tracker::LocalWorkspace;
    use tandem::ui::{self, WorkflowUI};

    let mut config = Config::new(project_dir, cli.verbose)?;
    apply_overrides(&mut config.toml, args);
    config.ensure_directories()?;
    for warning in config.toml.validate() {
        ui::print_warning(&warning);
    }

    let task_file = config.find_task_file(args.task_file.as_deref())?;
    let task = persist::read_file(&task_file)?;
    if task.is_empty() {
        anyhow::bail!("Task file is empty: {}", task_file.display());
    }

    let store = StateStore::new(config.state_file.clone(), config.runs_dir.clone());
    let checkpoints = CheckpointStore::new(config.checkpoint_dir.clone(), config.runs_dir.clone());
    let Some(mut state) = prepare_state(&config, args, &store, &checkpoints, &task_file)? else {
        return Ok(());
    };

    persist::write_file(
        &config.latest_run_file,
        &state.artifacts.run_dir.display().to_string(),
    )?;
    persist::write_file(&state.artifacts.task, &task)?;

    if let Some(phase) = args.from_phase {
        state.phase = phase.into();
        state.touch();
        store.save(&state)?;
    }

    let toml = &config.toml;
    let registry = config.registry();
    if args.dry_run {
        ui::print_info("Dry run: agents and tests are simulated, preflight is skipped.");
    } else {
        let agents = super::preflight::required_agents(toml, toml.defaults.allow_fallback);
        if !preflight::check(&registry, &agents, toml.defaults.strict_preflight).await {
            anyhow::bail!("Preflight failed.");
        }
    }

    let invoker: Arc<dyn AgentInvoker> = if args.dry_run {
        Arc::new(DryRunInvoker::new())
    } else {
        Arc::new(ProcessRuntime::new(
            registry.clone(),
            toml.output.clone(),
            config.project_dir.clone(),
        ))
    };
    let caller = AgentCaller::new(
        invoker,
        registry,
        toml.output.clone(),
        config.log_dir.clone(),
        toml.defaults.allow_fallback,
    );
    let probe = Arc::new(LocalWorkspace::new(
        config.project_dir.clone(),
        toml.tests.clone(),
        toml.snapshot.max_diff_chars,
        args.dry_run,
    ));
    let workflow_ui = WorkflowUI::new(cli.verbose);
    let workflow = Workflow::new(
        caller,
        probe,
        store.clone(),
        checkpoints,
        toml.roles.clone(),
        toml.defaults.max_agent_retries,
        workflow_ui,
    );

    if !state.phase1.progress.is_completed() {
        workflow.run_planning(&mut state, &task).await?;
    }
    if !state.phase1.progress.is_completed() {
        return Err(tandem::errors::OrchestratorError::PlanningIncomplete.into());
    }

    if !state.phase2.progress.is_completed() {
        let gate = ApprovalGate::new(args.auto);
        if !gate.confirm_phase_transition()? {
            anyhow::bail!(
                "Pipeline aborted at the phase transition gate. Continue later with `tandem run --resume`."
            );
        }
        let plan = persist::read_file(&state.artifacts.phase1_transcript)?;
        workflow.run_implementation(&mut state, &task, &plan).await?;
    }
    if !state.phase2.progress.is_completed() {
        anyhow::bail!("Phase 2 did not complete successfully.");
    }

    workflow_ui.print_artifacts(&state.artifacts);
    println!(
        "  {}latest pointer: {}",
        ui::icons::FOLDER,
        config.latest_run_file.display()
    );
    println!("State: {}", store.path().display());
    workflow_ui.print_summary(&RunSummary::from_state(&state, tandem::util::now()));
    Ok(())
}
