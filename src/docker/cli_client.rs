//! Docker CLI subprocess client - drives the `docker` binary

use crate::docker::{
    BuildContext, ContainerRuntime, ContainerSummary, DockerClientConfig, RuntimeError,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
}

impl From<PsLine> for ContainerSummary {
    fn from(line: PsLine) -> Self {
        let names = line
            .names
            .split(',')
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        ContainerSummary {
            id: line.id,
            names,
            image: line.image,
            state: line.state,
        }
    }
}

/// Container runtime backed by the `docker` command-line tool
#[derive(Debug, Clone)]
pub struct DockerCliClient {
    config: DockerClientConfig,
}

impl DockerCliClient {
    pub fn new(config: DockerClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DockerClientConfig {
        &self.config
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Run a docker command and return its stdout.
    ///
    /// # Errors
    /// Returns `RuntimeError` if:
    /// - The docker executable cannot be spawned
    /// - docker exits with a non-zero status
    /// - The command does not finish within `deadline`
    async fn run(
        &self,
        args: &[&str],
        stdin: Option<Vec<u8>>,
        deadline: Duration,
    ) -> Result<String, RuntimeError> {
        let command_line = format!("{} {}", self.config.binary, args.join(" "));
        debug!(command = %command_line, "Running docker command");

        let mut command = Command::new(&self.config.binary);
        if let Some(host) = &self.config.host {
            command.arg("--host").arg(host);
        }
        command
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| RuntimeError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        // Feed stdin from a separate task so a chatty child cannot fill its
        // stdout pipe while we are still writing
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
                pipe.write_all(&input).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let output = timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| RuntimeError::Timeout {
                command: command_line.clone(),
                timeout: deadline,
            })?
            .map_err(|source| RuntimeError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                warn!(command = %command_line, "Failed to write docker stdin: {}", e);
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command_line, code, "docker exited with an error: {}", stderr);
            return Err(RuntimeError::Command {
                command: command_line,
                code,
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        trace!(command = %command_line, "docker returned {} bytes of output", stdout.len());
        Ok(stdout)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliClient {
    async fn ping(&self) -> Result<(), RuntimeError> {
        let version = self
            .run(
                &["version", "--format", "{{.Server.Version}}"],
                None,
                self.default_timeout(),
            )
            .await
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        debug!("Connected to docker daemon version {}", version.trim());
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["pull", image], None, self.default_timeout())
            .await
            .map(|_| ())
    }

    async fn build(&self, context: BuildContext, tag: &str) -> Result<(), RuntimeError> {
        let dockerfile = context.dockerfile.clone();
        let output = self
            .run(
                &["build", "--file", dockerfile.as_str(), "--tag", tag, "-"],
                Some(context.archive),
                self.default_timeout(),
            )
            .await?;
        debug!(tag, "Build output:\n{}", output);
        Ok(())
    }

    async fn create(&self, image: &str, name: &str, cmd: &[String]) -> Result<String, RuntimeError> {
        let mut args = vec!["create", "--name", name, image];
        args.extend(cmd.iter().map(String::as_str));

        let id = self.run(&args, None, self.default_timeout()).await?;
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::Decode(format!(
                "docker create returned no id for container '{}'",
                name
            )));
        }
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["rm", id], None, self.default_timeout())
            .await
            .map(|_| ())
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["start", id], None, self.default_timeout())
            .await
            .map(|_| ())
    }

    async fn stop(&self, id: &str, grace: Option<Duration>) -> Result<(), RuntimeError> {
        match grace {
            Some(grace) => {
                let secs = stop_seconds(grace).to_string();
                // docker waits out the grace period itself before killing
                let deadline = self.default_timeout() + grace;
                self.run(&["stop", "--time", secs.as_str(), id], None, deadline).await?;
            }
            None => {
                self.run(&["stop", id], None, self.default_timeout()).await?;
            }
        }
        Ok(())
    }

    async fn pause(&self, id: &str, grace: Option<Duration>) -> Result<(), RuntimeError> {
        let deadline = grace.unwrap_or_else(|| self.default_timeout());
        self.run(&["pause", id], None, deadline).await.map(|_| ())
    }

    async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["restart", id], None, self.default_timeout())
            .await
            .map(|_| ())
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}"];
        if all {
            args.push("--all");
        }

        let output = self.run(&args, None, self.default_timeout()).await?;
        parse_ps_output(&output)
    }
}

/// `docker stop --time` takes whole seconds; round up so a short grace
/// period never turns into an immediate kill
fn stop_seconds(grace: Duration) -> u64 {
    grace.as_secs() + u64::from(grace.subsec_nanos() > 0)
}

fn parse_ps_output(output: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<PsLine>(line)
                .map(ContainerSummary::from)
                .map_err(|e| RuntimeError::Decode(format!("{}: {}", e, line)))
        })
        .collect()
}
