use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use agency_models::RuntimeConfig;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// A command-line model client invoked once per agent turn.
///
/// The system prompt and model go on the command line; the user prompt is
/// written to stdin so long session state does not hit argument limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCli {
    pub program: String,
    /// Arguments placed before the turn flags.
    pub prefix_args: Vec<String>,
    pub model: String,
    pub timeout: Duration,
    /// Tool server configuration and allow-list flags, after the turn flags.
    pub tool_args: Vec<String>,
    /// Layered over the inherited environment of the client process.
    pub env: BTreeMap<String, String>,
}

impl ModelCli {
    /// Client for `model`, launched and bounded as `runtime` says.
    pub fn new(runtime: &RuntimeConfig, model: &str) -> Self {
        Self {
            program: runtime.command.clone(),
            prefix_args: runtime.args.clone(),
            model: model.to_string(),
            timeout: Duration::from_secs(runtime.timeout_seconds),
            tool_args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn args<'a>(&'a self, system_prompt: &'a str) -> Vec<&'a str> {
        let turn = [
            "-p",
            "--system-prompt",
            system_prompt,
            "--model",
            self.model.as_str(),
            "--output-format",
            "text",
        ];
        self.prefix_args
            .iter()
            .map(String::as_str)
            .chain(turn)
            .chain(self.tool_args.iter().map(String::as_str))
            .collect()
    }

    fn command(&self, system_prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(system_prompt))
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one turn and return the trimmed reply.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        debug!(program = %self.program, model = %self.model, "Invoking model CLI");

        let mut child = self.command(system_prompt).spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => AgentError::Runtime(format!("{} not found on PATH", self.program)),
            _ => AgentError::Runtime(format!("Failed to start {}: {e}", self.program)),
        })?;

        let turn = async move {
            if let Some(mut stdin) = child.stdin.take() {
                // A client that exits without reading its input is judged by its exit status.
                match stdin.write_all(user_prompt.as_bytes()).await {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, turn)
            .await
            .map_err(|_| AgentError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.program, status = %output.status, stderr = %stderr.trim(), "Model CLI failed");
            return Err(AgentError::Runtime(format!(
                "{} exited {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(AgentError::Runtime(format!(
                "{} returned an empty reply",
                self.program
            )));
        }
        Ok(reply)
    }
}

/// True when `program --version` runs and exits zero.
pub async fn cli_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|status| status.success())
}
