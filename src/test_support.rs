//! Scripted doubles for the invoker and workspace seams.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::InvocationError;
use crate::runtime::AgentInvoker;
use crate::tracker::{TestSnapshot, WorkspaceProbe};

/// One scripted agent answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Timeout,
    /// Non-zero exit with this stderr text.
    Fail(String),
}

impl Reply {
    pub fn text(body: &str) -> Self {
        Self::Text(body.to_string())
    }
}

/// Invoker answering from per-agent queues and recording every call.
#[derive(Default)]
pub struct ScriptedInvoker {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, agent: &str, reply: Reply) {
        self.queues
            .lock()
            .unwrap()
            .entry(agent.to_string())
            .or_default()
            .push_back(reply);
    }

    /// `(agent, prompt)` for every invocation so far, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, prompt)| prompt).collect()
    }

    /// Replies not consumed yet, over all agents.
    pub fn remaining(&self) -> usize {
        self.queues.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, InvocationError> {
        self.calls
            .lock()
            .unwrap()
            .push((agent.to_string(), prompt.to_string()));
        let reply = self
            .queues
            .lock()
            .unwrap()
            .get_mut(agent)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Text(body)) => Ok(body.trim().to_string()),
            Some(Reply::Timeout) => Err(InvocationError::Timeout {
                agent: agent.to_string(),
                seconds: timeout.as_secs(),
            }),
            Some(Reply::Fail(detail)) => Err(InvocationError::NonZeroExit {
                agent: agent.to_string(),
                code: 1,
                detail,
            }),
            None => Err(InvocationError::EmptyOutput {
                agent: agent.to_string(),
            }),
        }
    }
}

/// Probe with queued test exit codes and a fixed repository snapshot.
pub struct ScriptedProbe {
    exits: Mutex<VecDeque<i32>>,
    snapshot: String,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            exits: Mutex::new(VecDeque::new()),
            snapshot: "=== git status --short ===\n M src/main.rs".to_string(),
        }
    }

    pub fn push_exit(&self, code: i32) {
        self.exits.lock().unwrap().push_back(code);
    }
}

#[async_trait]
impl WorkspaceProbe for ScriptedProbe {
    async fn run_tests(&self) -> TestSnapshot {
        let exit_code = self.exits.lock().unwrap().pop_front().unwrap_or(0);
        TestSnapshot {
            exit_code,
            report: format!("Exit code: {exit_code}\nscripted test run"),
        }
    }

    fn repo_snapshot(&self) -> String {
        self.snapshot.clone()
    }
}
