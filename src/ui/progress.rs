use console::style;

use super::icons::{CHECK, CROSS, FOLDER, INFO, SPARKLE, WARN};
use crate::orchestrator::state::{ArtifactPaths, WorkflowPhase};
use crate::orchestrator::summary::RunSummary;

/// Phase and cycle progress lines for the workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowUI {
    verbose: bool,
}

fn phase_label(phase: WorkflowPhase) -> &'static str {
    match phase {
        WorkflowPhase::Planning => "PHASE 1",
        WorkflowPhase::Implementation => "PHASE 2",
        WorkflowPhase::Done => "DONE",
    }
}

impl WorkflowUI {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print a full-width cyan separator line.
    pub fn print_separator(&self) {
        println!("{}", style("═".repeat(70)).cyan());
    }

    /// Header printed once when a phase starts or resumes.
    pub fn print_phase_header(&self, phase: WorkflowPhase, description: &str, next_cycle: u32, max_cycles: u32) {
        println!();
        self.print_separator();
        println!(
            "{} {}: {}",
            style("▶").green().bold(),
            style(phase_label(phase)).yellow().bold(),
            description
        );
        self.print_separator();
        println!(
            "{}  starting at cycle {} of {}",
            style("Budget:").dim(),
            next_cycle,
            max_cycles
        );
        println!();
    }

    /// One line per workflow step: `=== PHASE 1 | cycle 2/4: claude plan ===`.
    pub fn step(&self, phase: WorkflowPhase, cycle: u32, max_cycles: u32, what: &str) {
        println!(
            "{}",
            style(format!(
                "=== {} | cycle {}/{}: {} ===",
                phase_label(phase),
                cycle,
                max_cycles,
                what
            ))
            .bold()
        );
    }

    pub fn detail(&self, msg: &str) {
        if self.verbose {
            println!("    {} {}", style("→").dim(), style(msg).dim());
        }
    }

    pub fn override_warning(&self, planner: &str, reviewer: &str) {
        eprintln!(
            "{}{}",
            WARN,
            style(format!(
                "{planner} approval overridden to NO because {reviewer} has open findings."
            ))
            .yellow()
        );
    }

    pub fn cycle_not_approved(&self, phase: WorkflowPhase, flags: &str) {
        println!("{}{} not approved yet. {}.", INFO, phase_label(phase), flags);
    }

    pub fn phase_complete(&self, phase: WorkflowPhase, msg: &str) {
        println!(
            "{}{} completed: {}",
            CHECK,
            style(phase_label(phase)).green().bold(),
            msg
        );
    }

    pub fn phase_failed(&self, phase: WorkflowPhase, reason: &str) {
        eprintln!(
            "\n{}{} failed: {}\n",
            CROSS,
            style(phase_label(phase)).red().bold(),
            reason
        );
    }

    pub fn print_artifacts(&self, artifacts: &ArtifactPaths) {
        println!("\n{} Pipeline completed successfully.", SPARKLE);
        println!("{}", style("Artifacts:").underlined());
        for path in [
            &artifacts.task,
            &artifacts.phase1_transcript,
            &artifacts.phase2_transcript,
        ] {
            println!("  {}{}", FOLDER, path.display());
        }
    }

    pub fn print_summary(&self, summary: &RunSummary) {
        println!("\n{}", style("Run Summary:").underlined());
        println!("  - run: {}", summary.run_id);
        println!("  - phase: {}", summary.phase);
        println!("  - duration: {}", summary.duration);
        println!(
            "  - phase1 cycles: {} ({})",
            summary.phase1_cycles, summary.phase1_status
        );
        println!(
            "  - phase2 cycles: {} ({})",
            summary.phase2_cycles, summary.phase2_status
        );
        println!(
            "  - closed findings: {}",
            style(summary.closed_findings).green()
        );
        println!("  - open findings: {}", style(summary.open_findings).red());
    }
}
