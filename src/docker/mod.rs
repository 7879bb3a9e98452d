//! Container runtime access and the managed-container registry

pub mod cli_client;
pub mod client;
pub mod registry;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;

pub use cli_client::DockerCliClient;
pub use client::DockerClientConfig;
pub use registry::{ContainerError, ContainerRegistry, SharedContainers};
pub use types::{
    BuildContext, ContainerStatus, ContainerSummary, ManagedContainer, RuntimeError,
};

/// Operations the framework needs from a container runtime.
///
/// Implementations talk to the actual daemon; the registry only ever goes
/// through this trait so tests can substitute an in-memory runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the daemon is reachable
    async fn ping(&self) -> Result<(), RuntimeError>;

    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    async fn build(&self, context: BuildContext, tag: &str) -> Result<(), RuntimeError>;

    /// Create a container and return the id the runtime assigned to it
    async fn create(&self, image: &str, name: &str, cmd: &[String]) -> Result<String, RuntimeError>;

    async fn delete(&self, id: &str) -> Result<(), RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    /// Stop a container, giving it `grace` to shut down before it is killed
    async fn stop(&self, id: &str, grace: Option<Duration>) -> Result<(), RuntimeError>;

    async fn pause(&self, id: &str, grace: Option<Duration>) -> Result<(), RuntimeError>;

    async fn restart(&self, id: &str) -> Result<(), RuntimeError>;

    /// List containers; `all` includes stopped and completed ones
    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, RuntimeError>;
}
