pub mod icons;
pub mod output;
pub mod progress;

pub use output::{
    agent_spinner, print_agent_output, print_checkpoint, print_error, print_fallback, print_info,
    print_live_line, print_recovery, print_warning,
};
pub use progress::WorkflowUI;
