//! Registry of containers managed by the framework
//!
//! The registry is the single source of truth for which containers the
//! framework may manipulate. An entry exists iff the framework believes the
//! container exists in the runtime: entries are added only after the runtime
//! confirms a create and removed only after it confirms a delete. Failed
//! runtime calls never touch local state.

use crate::docker::{BuildContext, ContainerRuntime, ContainerStatus, ManagedContainer, RuntimeError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Registry shared between the engine and step handlers
pub type SharedContainers = Arc<Mutex<ContainerRegistry>>;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container '{0}' already exists")]
    AlreadyExists(String),

    #[error("Container '{0}' is not managed by the framework")]
    NotFound(String),

    /// Passed through from the runtime unchanged
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("failed to read Dockerfile '{path}'")]
    Dockerfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tracks containers by name and proxies lifecycle calls to the runtime
pub struct ContainerRegistry {
    runtime: Arc<dyn ContainerRuntime>,
    containers: BTreeMap<String, ManagedContainer>,
}

impl fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("containers", &self.containers)
            .finish_non_exhaustive()
    }
}

impl ContainerRegistry {
    /// Connect to the runtime and seed the registry with every container it
    /// reports, running or not.
    pub async fn initialize(runtime: Arc<dyn ContainerRuntime>) -> Result<Self, ContainerError> {
        debug!("Initializing container registry");
        runtime.ping().await?;

        let mut registry = Self {
            runtime,
            containers: BTreeMap::new(),
        };
        registry.refresh().await?;

        info!("Container registry tracking {} container(s)", registry.len());
        Ok(registry)
    }

    /// Wrap the registry for sharing with step handlers
    pub fn into_shared(self) -> SharedContainers {
        Arc::new(Mutex::new(self))
    }

    /// Discard local state and re-seed from the runtime.
    ///
    /// Local state is left as it was if the listing fails.
    pub async fn refresh(&mut self) -> Result<(), ContainerError> {
        let summaries = self.runtime.list(true).await?;

        self.containers = summaries
            .iter()
            .filter_map(ManagedContainer::from_summary)
            .map(|c| (c.name.clone(), c))
            .collect();

        debug!(containers = ?self.containers.keys().collect::<Vec<_>>(), "Seeded container registry");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ManagedContainer> {
        self.containers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Managed containers ordered by name
    pub fn containers(&self) -> impl Iterator<Item = &ManagedContainer> {
        self.containers.values()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Containers as the runtime currently reports them, without touching
    /// the registry
    pub async fn list_runtime(&self, all: bool) -> Result<Vec<ManagedContainer>, ContainerError> {
        let summaries = self.runtime.list(all).await?;
        Ok(summaries.iter().filter_map(ManagedContainer::from_summary).collect())
    }

    pub async fn pull_image(&self, image: &str) -> Result<(), ContainerError> {
        info!(image, "Pulling image");
        self.runtime.pull(image).await?;
        Ok(())
    }

    /// Build an image from a single Dockerfile, tagged `tag`
    pub async fn build_image(&self, dockerfile: &Path, tag: &str) -> Result<(), ContainerError> {
        info!(dockerfile = %dockerfile.display(), tag, "Building image");
        let contents = tokio::fs::read(dockerfile)
            .await
            .map_err(|source| ContainerError::Dockerfile {
                path: dockerfile.to_path_buf(),
                source,
            })?;

        let name = dockerfile
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Dockerfile".to_string());

        let context = BuildContext::from_dockerfile(&name, &contents).map_err(|source| {
            ContainerError::Dockerfile {
                path: dockerfile.to_path_buf(),
                source,
            }
        })?;

        self.runtime.build(context, tag).await?;
        Ok(())
    }

    /// Create a container. The entry is only added once the runtime has
    /// assigned it an id.
    pub async fn create(&mut self, image: &str, name: &str, cmd: &[String]) -> Result<(), ContainerError> {
        if self.containers.contains_key(name) {
            warn!(container = name, "Refusing to create a container that already exists");
            return Err(ContainerError::AlreadyExists(name.to_string()));
        }

        let id = self.runtime.create(image, name, cmd).await?;
        info!(container = name, image, id = %id, "Created container");

        self.containers.insert(
            name.to_string(),
            ManagedContainer {
                name: name.to_string(),
                image: image.to_string(),
                id,
                status: ContainerStatus::Created,
            },
        );
        Ok(())
    }

    /// Delete a container. A failed delete leaves the entry in place.
    pub async fn delete(&mut self, name: &str) -> Result<(), ContainerError> {
        let id = self.id_of(name)?;
        self.runtime.delete(&id).await?;
        self.containers.remove(name);
        info!(container = name, "Deleted container");
        Ok(())
    }

    pub async fn start(&mut self, name: &str) -> Result<(), ContainerError> {
        let id = self.id_of(name)?;
        self.runtime.start(&id).await?;
        self.set_status(name, ContainerStatus::Running);
        Ok(())
    }

    pub async fn stop(&mut self, name: &str, grace: Option<Duration>) -> Result<(), ContainerError> {
        let id = self.id_of(name)?;
        self.runtime.stop(&id, grace).await?;
        self.set_status(name, ContainerStatus::Exited);
        Ok(())
    }

    pub async fn pause(&mut self, name: &str, grace: Option<Duration>) -> Result<(), ContainerError> {
        let id = self.id_of(name)?;
        self.runtime.pause(&id, grace).await?;
        self.set_status(name, ContainerStatus::Paused);
        Ok(())
    }

    pub async fn restart(&mut self, name: &str) -> Result<(), ContainerError> {
        let id = self.id_of(name)?;
        self.runtime.restart(&id).await?;
        self.set_status(name, ContainerStatus::Running);
        Ok(())
    }

    fn id_of(&self, name: &str) -> Result<String, ContainerError> {
        self.containers
            .get(name)
            .map(|c| c.id.clone())
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))
    }

    fn set_status(&mut self, name: &str, status: ContainerStatus) {
        if let Some(container) = self.containers.get_mut(name) {
            debug!(container = name, from = %container.status, to = %status, "Container status changed");
            container.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::ContainerSummary;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Runtime that records calls and fails the ones it is told to
    #[derive(Default)]
    struct FakeRuntime {
        calls: StdMutex<Vec<String>>,
        listing: Vec<ContainerSummary>,
        fail: Option<&'static str>,
    }

    impl FakeRuntime {
        fn record(&self, call: &'static str, arg: &str) -> Result<(), RuntimeError> {
            self.calls.lock().unwrap().push(format!("{} {}", call, arg));
            if self.fail == Some(call) {
                return Err(RuntimeError::Command {
                    command: format!("docker {}", call),
                    code: 1,
                    stderr: format!("{} refused", call),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn ping(&self) -> Result<(), RuntimeError> {
            self.record("ping", "")
        }
        async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
            self.record("pull", image)
        }
        async fn build(&self, context: BuildContext, tag: &str) -> Result<(), RuntimeError> {
            self.record("build", &format!("{} {}", context.dockerfile, tag))
        }
        async fn create(&self, _image: &str, name: &str, _cmd: &[String]) -> Result<String, RuntimeError> {
            self.record("create", name)?;
            Ok(format!("id-{}", name))
        }
        async fn delete(&self, id: &str) -> Result<(), RuntimeError> {
            self.record("delete", id)
        }
        async fn start(&self, id: &str) -> Result<(), RuntimeError> {
            self.record("start", id)
        }
        async fn stop(&self, id: &str, _grace: Option<Duration>) -> Result<(), RuntimeError> {
            self.record("stop", id)
        }
        async fn pause(&self, id: &str, _grace: Option<Duration>) -> Result<(), RuntimeError> {
            self.record("pause", id)
        }
        async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
            self.record("restart", id)
        }
        async fn list(&self, _all: bool) -> Result<Vec<ContainerSummary>, RuntimeError> {
            self.record("list", "")?;
            Ok(self.listing.clone())
        }
    }

    async fn registry_with(runtime: FakeRuntime) -> (ContainerRegistry, Arc<FakeRuntime>) {
        let runtime = Arc::new(runtime);
        let registry = ContainerRegistry::initialize(runtime.clone()).await.unwrap();
        (registry, runtime)
    }

    #[tokio::test]
    async fn test_initialize_seeds_from_runtime() {
        let listing = vec![
            ContainerSummary {
                id: "a1".to_string(),
                names: vec!["/web".to_string()],
                image: "nginx".to_string(),
                state: "running".to_string(),
            },
            ContainerSummary {
                id: "b2".to_string(),
                names: vec!["batch".to_string()],
                image: "busybox".to_string(),
                state: "restarting".to_string(),
            },
        ];
        let (registry, runtime) = registry_with(FakeRuntime { listing, ..Default::default() }).await;

        assert_eq!(runtime.calls(), vec!["ping ", "list "]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("web").unwrap().status, ContainerStatus::Running);
        assert_eq!(registry.get("batch").unwrap().status, ContainerStatus::Created);
    }

    #[tokio::test]
    async fn test_lifecycle_updates_status() {
        let (mut registry, runtime) = registry_with(FakeRuntime::default()).await;

        registry.create("redis", "cache", &[]).await.unwrap();
        assert_eq!(registry.get("cache").unwrap().id, "id-cache");
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Created);

        registry.start("cache").await.unwrap();
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Running);

        registry.pause("cache", None).await.unwrap();
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Paused);

        registry.restart("cache").await.unwrap();
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Running);

        registry.stop("cache", Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Exited);

        registry.delete("cache").await.unwrap();
        assert!(registry.get("cache").is_none());

        // Restart goes to the runtime's restart call, never to pause
        let calls = runtime.calls();
        assert!(calls.contains(&"restart id-cache".to_string()));
        assert_eq!(calls.iter().filter(|c| c.starts_with("pause")).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_operation_keeps_status() {
        let (mut registry, _) = registry_with(FakeRuntime { fail: Some("start"), ..Default::default() }).await;

        registry.create("redis", "cache", &[]).await.unwrap();
        let err = registry.start("cache").await.unwrap_err();

        assert_eq!(err.to_string(), "`docker start` exited with code 1: start refused");
        assert!(matches!(err, ContainerError::Runtime(RuntimeError::Command { .. })));
        assert_eq!(registry.get("cache").unwrap().status, ContainerStatus::Created);
    }

    #[tokio::test]
    async fn test_failed_create_adds_nothing() {
        let (mut registry, _) = registry_with(FakeRuntime { fail: Some("create"), ..Default::default() }).await;

        assert!(registry.create("redis", "cache", &[]).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entry() {
        let (mut registry, _) = registry_with(FakeRuntime { fail: Some("delete"), ..Default::default() }).await;

        registry.create("redis", "cache", &[]).await.unwrap();
        assert!(registry.delete("cache").await.is_err());
        assert!(registry.contains("cache"));
    }

    #[tokio::test]
    async fn test_unknown_names_never_reach_runtime() {
        let (mut registry, runtime) = registry_with(FakeRuntime::default()).await;
        let before = runtime.calls().len();

        assert!(matches!(registry.start("ghost").await, Err(ContainerError::NotFound(_))));
        assert!(matches!(registry.stop("ghost", None).await, Err(ContainerError::NotFound(_))));
        assert!(matches!(registry.pause("ghost", None).await, Err(ContainerError::NotFound(_))));
        assert!(matches!(registry.restart("ghost").await, Err(ContainerError::NotFound(_))));
        assert!(matches!(registry.delete("ghost").await, Err(ContainerError::NotFound(_))));

        assert_eq!(runtime.calls().len(), before);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_runtime_unreachable() {
        let runtime = Arc::new(FakeRuntime { fail: Some("ping"), ..Default::default() });
        let result = ContainerRegistry::initialize(runtime.clone()).await;

        assert!(result.is_err());
        assert_eq!(runtime.calls(), vec!["ping "]);
    }

    #[tokio::test]
    async fn test_build_image_reads_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile.api");
        std::fs::write(&path, "FROM alpine\n").unwrap();

        let (registry, runtime) = registry_with(FakeRuntime::default()).await;
        registry.build_image(&path, "api:test").await.unwrap();
        assert!(runtime.calls().contains(&"build Dockerfile.api api:test".to_string()));

        let missing = registry.build_image(&dir.path().join("nope"), "x").await;
        assert!(matches!(missing, Err(ContainerError::Dockerfile { .. })));
    }
}
