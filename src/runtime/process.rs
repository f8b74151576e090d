//! Subprocess-backed [`AgentInvoker`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::AgentInvoker;
use super::filter::{Channel, LiveStreamFilter};
use crate::errors::InvocationError;
use crate::tandem_config::{AgentDefinition, AgentRegistry, OutputSettings, PromptDelivery};
use crate::ui;
use crate::util::{MAX_ERROR_CHARS, shorten};

/// Interval at which a streamed call re-checks its deadline when no line arrives.
const STREAM_TICK: Duration = Duration::from_millis(200);

/// Raw result of a finished child.
struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Spawns agent CLIs as configured in an [`AgentRegistry`].
pub struct ProcessRuntime {
    registry: AgentRegistry,
    output: OutputSettings,
    workdir: PathBuf,
}

impl ProcessRuntime {
    pub fn new(registry: AgentRegistry, output: OutputSettings, workdir: PathBuf) -> Self {
        Self {
            registry,
            output,
            workdir,
        }
    }

    fn command(
        &self,
        agent: &str,
        definition: &AgentDefinition,
        prompt: &str,
        side_channel: Option<(&str, &TempPath)>,
    ) -> Result<Command, InvocationError> {
        let (program, fixed_args) =
            definition
                .command
                .split_first()
                .ok_or_else(|| InvocationError::Launch {
                    agent: agent.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "agent command is empty",
                    ),
                })?;

        let mut cmd = Command::new(program);
        cmd.args(fixed_args);
        if let Some((flag, path)) = side_channel {
            cmd.arg(flag).arg(path.as_os_str());
        }
        let stdin = match definition.prompt_delivery {
            PromptDelivery::Argument => {
                cmd.arg(prompt);
                Stdio::null()
            }
            PromptDelivery::Stdin => Stdio::piped(),
        };
        cmd.envs(&definition.env)
            .current_dir(&self.workdir)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// Wait for exit and collect both pipes at once.
    async fn capture(
        &self,
        agent: &str,
        child: Child,
        timeout: Duration,
    ) -> Result<Captured, InvocationError> {
        let spinner = ui::agent_spinner(agent);
        let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
        spinner.finish_and_clear();

        match result {
            Ok(Ok(output)) => Ok(Captured {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(source)) => Err(InvocationError::Launch {
                agent: agent.to_string(),
                source,
            }),
            Err(_) => {
                // Dropping the wait future dropped the child, which kills it.
                warn!(agent, seconds = timeout.as_secs(), "agent timed out; killed");
                Err(InvocationError::Timeout {
                    agent: agent.to_string(),
                    seconds: timeout.as_secs(),
                })
            }
        }
    }

    /// Read both pipes line by line as they arrive, echoing through the live filter.
    ///
    /// Reading stops at EOF on both pipes, or once the child has exited and a full tick
    /// passes with no new line. A background grandchild may keep a pipe open forever.
    async fn stream(
        &self,
        agent: &str,
        definition: &AgentDefinition,
        mut child: Child,
        timeout: Duration,
    ) -> Result<Captured, InvocationError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || InvocationError::Timeout {
            agent: agent.to_string(),
            seconds: timeout.as_secs(),
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(InvocationError::Launch {
                agent: agent.to_string(),
                source: std::io::Error::other("child pipes were not captured"),
            });
        };
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');
        let (mut out_open, mut err_open) = (true, true);

        let mut filter = LiveStreamFilter::new(
            self.output.live_stream_mode,
            self.output.live_stream_channels,
            definition.filter_stderr_chrome,
        );
        let mut ticker = tokio::time::interval(STREAM_TICK);
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();
        let mut exited: Option<ExitStatus> = None;
        let mut idle = true;

        while out_open || err_open {
            if Instant::now() >= deadline {
                let _ = child.kill().await;
                warn!(agent, seconds = timeout.as_secs(), "agent timed out; killed");
                return Err(timed_out());
            }

            tokio::select! {
                segment = out_lines.next_segment(), if out_open => {
                    match read_line(agent, Channel::Stdout, segment) {
                        Some(line) => {
                            idle = false;
                            if filter.should_emit(Channel::Stdout, &line) {
                                ui::print_live_line(agent, Channel::Stdout, &line);
                            }
                            stdout_buf.push_str(&line);
                            stdout_buf.push('\n');
                        }
                        None => out_open = false,
                    }
                },
                segment = err_lines.next_segment(), if err_open => {
                    match read_line(agent, Channel::Stderr, segment) {
                        Some(line) => {
                            idle = false;
                            if filter.should_emit(Channel::Stderr, &line) {
                                ui::print_live_line(agent, Channel::Stderr, &line);
                            }
                            stderr_buf.push_str(&line);
                            stderr_buf.push('\n');
                        }
                        None => err_open = false,
                    }
                },
                _ = ticker.tick() => {
                    if exited.is_some() && idle {
                        debug!(agent, "agent exited with a pipe still held open; done reading");
                        break;
                    }
                    if exited.is_none()
                        && let Ok(Some(status)) = child.try_wait()
                    {
                        exited = Some(status);
                    }
                    idle = true;
                }
            }
        }

        let status = match exited {
            Some(status) => status,
            None => match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => status,
                Ok(Err(source)) => {
                    return Err(InvocationError::Launch {
                        agent: agent.to_string(),
                        source,
                    });
                }
                Err(_) => {
                    let _ = child.kill().await;
                    warn!(agent, "agent closed its pipes but did not exit; killed");
                    return Err(timed_out());
                }
            },
        };

        Ok(Captured {
            status,
            stdout: stdout_buf,
            stderr: stderr_buf,
        })
    }
}

/// Decode one raw pipe segment. `None` ends the channel, at EOF or on a read error.
fn read_line(
    agent: &str,
    channel: Channel,
    segment: std::io::Result<Option<Vec<u8>>>,
) -> Option<String> {
    match segment {
        Ok(Some(mut bytes)) => {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        Ok(None) => None,
        Err(err) => {
            warn!(agent, ?channel, error = %err, "failed to read agent output; channel closed");
            None
        }
    }
}

#[async_trait]
impl AgentInvoker for ProcessRuntime {
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.len()))]
    async fn invoke(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, InvocationError> {
        let definition = self
            .registry
            .get(agent)
            .ok_or_else(|| InvocationError::UnknownAgent {
                agent: agent.to_string(),
            })?;

        let side_channel = match &definition.final_message_flag {
            Some(flag) => {
                let path = tempfile::Builder::new()
                    .prefix(&format!("{agent}-last-message-"))
                    .suffix(".txt")
                    .tempfile()
                    .map_err(|source| InvocationError::Launch {
                        agent: agent.to_string(),
                        source,
                    })?
                    .into_temp_path();
                Some((flag.as_str(), path))
            }
            None => None,
        };

        let mut cmd = self.command(
            agent,
            definition,
            prompt,
            side_channel.as_ref().map(|(flag, path)| (*flag, path)),
        )?;
        let mut child = cmd.spawn().map_err(|source| InvocationError::Launch {
            agent: agent.to_string(),
            source,
        })?;
        debug!(agent, pid = ?child.id(), "agent spawned");

        if let Some(mut stdin) = child.stdin.take() {
            // Fed from a separate task so a chatty child cannot block on a full stdout pipe.
            let prompt = prompt.to_string();
            let agent_key = agent.to_string();
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(agent = %agent_key, error = %err, "agent did not read the full prompt");
                }
                let _ = stdin.shutdown().await;
            });
        }

        let captured = if self.output.live_stream {
            self.stream(agent, definition, child, timeout).await?
        } else {
            self.capture(agent, child, timeout).await?
        };

        let stdout = captured.stdout.trim();
        let mut final_text = stdout.to_string();
        if let Some((_, path)) = &side_channel
            && let Ok(content) = tokio::fs::read_to_string(path).await
            && !content.trim().is_empty()
        {
            final_text = content.trim().to_string();
        }
        drop(side_channel);

        if !captured.status.success() {
            let stderr = captured.stderr.trim();
            let detail = [stderr, stdout]
                .into_iter()
                .find(|text| !text.is_empty())
                .unwrap_or("Unknown CLI error without output.");
            return Err(InvocationError::NonZeroExit {
                agent: agent.to_string(),
                code: captured.status.code().unwrap_or(-1),
                detail: shorten(detail, MAX_ERROR_CHARS),
            });
        }

        if final_text.is_empty() {
            return Err(InvocationError::EmptyOutput {
                agent: agent.to_string(),
            });
        }

        debug!(agent, chars = final_text.len(), "agent finished");
        Ok(final_text)
    }
}
