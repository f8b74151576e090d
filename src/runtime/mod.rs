//! Agent invocation runtime.
//!
//! The [`AgentInvoker`] trait decouples the workflow from the actual agent
//! backend. [`ProcessRuntime`] spawns the configured CLI, [`DryRunInvoker`]
//! answers without spawning anything, and tests use scripted invokers that
//! return predetermined outputs.
//!
//! [`AgentCaller`] wraps an invoker with contract validation, bounded retry
//! and quota fallback.

pub mod caller;
pub mod dry_run;
pub mod filter;
pub mod preflight;
pub mod process;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::InvocationError;

pub use caller::{AgentCall, AgentCaller, OutputValidator, is_quota_or_rate_limit_error};
pub use dry_run::DryRunInvoker;
pub use filter::{Channel, LiveStreamFilter};
pub use process::ProcessRuntime;

/// Abstraction over agent execution backends.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Send `prompt` to `agent` and return its trimmed final text.
    async fn invoke(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, InvocationError>;
}
