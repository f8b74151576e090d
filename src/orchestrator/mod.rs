//! Workflow state, persistence and the two-phase review loop.

pub mod checkpoint;
pub mod migrate;
pub mod persist;
pub mod prompts;
pub mod state;
pub mod summary;
pub mod workflow;

pub use checkpoint::CheckpointStore;
pub use state::{ArtifactPaths, PhaseStatus, StateStore, WorkflowPhase, WorkflowState};
pub use summary::RunSummary;
pub use workflow::Workflow;
