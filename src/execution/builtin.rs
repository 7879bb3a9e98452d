//! Built-in steps available to every procedure
//!
//! Variables each step reads are listed in its doc comment.

use crate::core::{Settings, Step};
use crate::execution::registry::{RegistryError, StepHandler, StepRegistry};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Record the outcome on the step and log the end of it
fn finish<E>(step: &mut Step, result: Result<(), E>) -> anyhow::Result<()>
where
    E: Into<anyhow::Error>,
{
    step.set_outcome(&result);
    match result {
        Ok(()) => {
            info!(step = %step.description, passed = true, "End of step");
            Ok(())
        }
        Err(e) => {
            let e = e.into();
            warn!(step = %step.description, passed = false, "End of step: {:#}", e);
            Err(e)
        }
    }
}

fn trace_entrance(step: &Step) {
    debug!(step = %step.description, variables = ?step.variables, "Beginning of step");
}

/// Greets someone.
///
/// - `NAME`: who to say hello to
pub struct SayHello;

#[async_trait]
impl StepHandler for SayHello {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        let result = step.get_string("NAME").map(|name| {
            info!("Hello there {}!", name);
        });
        finish(step, result)
    }
}

/// Greets whoever is quoted in the description, e.g. `Say hello to 'Bob'`
pub struct SayHelloToNamed;

#[async_trait]
impl StepHandler for SayHelloToNamed {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        let result = step.description_arguments().map(|names| {
            for name in names {
                info!("Hello there {}!", name);
            }
        });
        finish(step, result)
    }
}

/// Pulls an image onto the daemon.
///
/// - `IMAGE_REPOSITORY`: repository to pull from
/// - `IMAGE_NAME`: image within the repository
/// - `IMAGE_TAG`: optional tag
pub struct PullImage;

#[async_trait]
impl StepHandler for PullImage {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        step.require_variables(&["IMAGE_REPOSITORY", "IMAGE_NAME"])?;

        let mut image = format!(
            "{}/{}",
            step.get_string("IMAGE_REPOSITORY")?,
            step.get_string("IMAGE_NAME")?
        );
        if let Some(tag) = step.get_optional("IMAGE_TAG").filter(|t| !t.is_empty()) {
            image = format!("{}:{}", image, tag);
        }

        let result = step.containers()?.lock().await.pull_image(&image).await;
        finish(step, result)
    }
}

/// Builds an image from a Dockerfile in the Dockerfile directory.
///
/// - `DOCKERFILE`: file name of the Dockerfile
/// - `IMAGE_NAME`: tag for the built image
pub struct BuildImage {
    dockerfile_dir: PathBuf,
}

impl BuildImage {
    pub fn new(dockerfile_dir: impl Into<PathBuf>) -> Self {
        Self {
            dockerfile_dir: dockerfile_dir.into(),
        }
    }
}

#[async_trait]
impl StepHandler for BuildImage {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        step.require_variables(&["DOCKERFILE", "IMAGE_NAME"])?;

        let dockerfile = self.dockerfile_dir.join(step.get_string("DOCKERFILE")?);
        let tag = step.get_string("IMAGE_NAME")?.to_string();

        let result = step
            .containers()?
            .lock()
            .await
            .build_image(&dockerfile, &tag)
            .await;
        finish(step, result)
    }
}

/// Creates a managed container.
///
/// - `IMAGE`: image to create the container from
/// - `CONTAINER_NAME`: name to register the container under
/// - `CMD`: optional comma separated command
pub struct CreateContainer;

#[async_trait]
impl StepHandler for CreateContainer {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        step.require_variables(&["IMAGE", "CONTAINER_NAME"])?;

        let image = step.get_string("IMAGE")?.to_string();
        let name = step.get_string("CONTAINER_NAME")?.to_string();
        let cmd = match step.get_optional("CMD") {
            Some(cmd) if !cmd.is_empty() => step.get_string_list("CMD")?,
            _ => Vec::new(),
        };

        let result = step
            .containers()?
            .lock()
            .await
            .create(&image, &name, &cmd)
            .await;
        finish(step, result)
    }
}

/// Lifecycle operations on an existing managed container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Pause,
    Restart,
    Delete,
}

/// Applies a lifecycle action to a managed container.
///
/// - `CONTAINER_NAME`: registered container name
/// - `GRACE_PERIOD`: optional duration (`10s`, `1m`) for stop and pause
pub struct ContainerLifecycle {
    action: LifecycleAction,
}

impl ContainerLifecycle {
    pub fn new(action: LifecycleAction) -> Self {
        Self { action }
    }
}

#[async_trait]
impl StepHandler for ContainerLifecycle {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        let name = step.get_string("CONTAINER_NAME")?.to_string();
        let grace = match step.get_optional("GRACE_PERIOD") {
            Some(_) => Some(step.get_duration("GRACE_PERIOD")?),
            None => None,
        };

        let mut containers = step.containers()?.lock().await;
        let result = match self.action {
            LifecycleAction::Start => containers.start(&name).await,
            LifecycleAction::Stop => containers.stop(&name, grace).await,
            LifecycleAction::Pause => containers.pause(&name, grace).await,
            LifecycleAction::Restart => containers.restart(&name).await,
            LifecycleAction::Delete => containers.delete(&name).await,
        };
        drop(containers);
        finish(step, result)
    }
}

/// Re-seeds the container registry from the runtime
pub struct RefreshContainers;

#[async_trait]
impl StepHandler for RefreshContainers {
    async fn handle(&self, step: &mut Step) -> anyhow::Result<()> {
        trace_entrance(step);
        let result = step.containers()?.lock().await.refresh().await;
        finish(step, result)
    }
}

/// Register every built-in step
pub fn register_defaults(registry: &mut StepRegistry, settings: &Settings) -> Result<(), RegistryError> {
    registry.register("Say hello to", SayHello)?;
    registry.register("Say hello to '${string}'", SayHelloToNamed)?;
    registry.register("Pull image", PullImage)?;
    registry.register("Build image", BuildImage::new(settings.dockerfile_dir()))?;
    registry.register("Create container", CreateContainer)?;
    registry.register("Start container", ContainerLifecycle::new(LifecycleAction::Start))?;
    registry.register("Stop container", ContainerLifecycle::new(LifecycleAction::Stop))?;
    registry.register("Pause container", ContainerLifecycle::new(LifecycleAction::Pause))?;
    registry.register("Restart container", ContainerLifecycle::new(LifecycleAction::Restart))?;
    registry.register("Delete container", ContainerLifecycle::new(LifecycleAction::Delete))?;
    registry.register("Refresh containers", RefreshContainers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_say_hello_passes_with_name() {
        let mut step = Step::new("Say hello to").with_variable("NAME", "Julian");
        SayHello.handle(&mut step).await.unwrap();
        assert!(step.has_passed());
    }

    #[tokio::test]
    async fn test_say_hello_fails_without_name() {
        let mut step = Step::new("Say hello to");
        let err = SayHello.handle(&mut step).await.unwrap_err();
        assert!(!step.has_passed());
        assert_eq!(err.to_string(), "Could not find variable 'NAME' in step.variables");
    }

    #[tokio::test]
    async fn test_named_greeting_reads_description() {
        let mut step = Step::new("Say hello to 'Bob'");
        SayHelloToNamed.handle(&mut step).await.unwrap();
        assert!(step.has_passed());
    }

    #[tokio::test]
    async fn test_container_steps_need_a_runtime() {
        let mut step = Step::new("Start container").with_variable("CONTAINER_NAME", "web");
        let err = ContainerLifecycle::new(LifecycleAction::Start)
            .handle(&mut step)
            .await
            .unwrap_err();
        assert!(!step.has_passed());
        assert!(err.to_string().contains("needs a container runtime"));
    }

    #[tokio::test]
    async fn test_pull_image_checks_variables_first() {
        let mut step = Step::new("Pull image").with_variable("IMAGE_NAME", "redis");
        let err = PullImage.handle(&mut step).await.unwrap_err();
        assert!(err.to_string().contains("IMAGE_REPOSITORY"));
    }

    #[test]
    fn test_defaults_register_cleanly() {
        let mut registry = StepRegistry::new();
        register_defaults(&mut registry, &Settings::default()).unwrap();
        assert!(registry.resolve("Say hello to").is_ok());
        assert!(registry.resolve("Say hello to 'Alice'").is_ok());
        assert!(registry.resolve("Delete container").is_ok());

        // A second pass collides on every description
        assert!(register_defaults(&mut registry, &Settings::default()).is_err());
    }
}
