//! Container runtime types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types for container runtime operations.
///
/// These are opaque to the rest of the framework and are surfaced verbatim
/// to whoever issued the operation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("could not decode runtime output: {0}")]
    Decode(String),

    #[error("container runtime is unavailable: {0}")]
    Unavailable(String),
}

/// Status of a managed container.
///
/// Local operations only ever move a container between `Created`,
/// `Running`, `Paused` and `Exited`:
///
/// - `Created | Exited | Paused` --start--> `Running`
/// - `Running` --stop--> `Exited`
/// - any --pause--> `Paused`
/// - `Paused | Exited` --restart--> `Running`
///
/// `Completed` and `Errored` are only ever observed from the runtime (when
/// the registry is seeded or refreshed). No local operation produces them,
/// so the local state machine is not closed under its own operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Exited,
    Completed,
    Errored,
}

impl ContainerStatus {
    /// Map a runtime state string to a status. Unrecognised states are `Created`.
    pub fn from_runtime_state(state: &str) -> Self {
        match state {
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "exited" => ContainerStatus::Exited,
            "completed" => ContainerStatus::Completed,
            "errored" | "dead" => ContainerStatus::Errored,
            _ => ContainerStatus::Created,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "Created",
            ContainerStatus::Running => "Running",
            ContainerStatus::Paused => "Paused",
            ContainerStatus::Exited => "Exited",
            ContainerStatus::Completed => "Completed",
            ContainerStatus::Errored => "Errored",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container as reported by the runtime's listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    /// Raw runtime state, e.g. `running` or `exited`
    pub state: String,
}

impl ContainerSummary {
    /// Primary name, without the leading `/` some runtimes report
    pub fn name(&self) -> Option<&str> {
        self.names.first().map(|n| n.trim_start_matches('/'))
    }
}

/// A container the framework tracks and is allowed to manipulate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedContainer {
    pub name: String,
    pub image: String,
    /// Assigned by the runtime on creation
    pub id: String,
    pub status: ContainerStatus,
}

impl ManagedContainer {
    pub(crate) fn from_summary(summary: &ContainerSummary) -> Option<Self> {
        Some(Self {
            name: summary.name()?.to_string(),
            image: summary.image.clone(),
            id: summary.id.clone(),
            status: ContainerStatus::from_runtime_state(&summary.state),
        })
    }
}

/// Build context handed to the runtime: an in-memory tar archive plus the
/// path of the Dockerfile inside it.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub dockerfile: String,
    pub archive: Vec<u8>,
}

impl BuildContext {
    /// Pack a single Dockerfile as the only entry of the context
    pub fn from_dockerfile(dockerfile: &str, contents: &[u8]) -> std::io::Result<Self> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, dockerfile, contents)?;
        let archive = builder.into_inner()?;

        Ok(Self {
            dockerfile: dockerfile.to_string(),
            archive,
        })
    }
}
