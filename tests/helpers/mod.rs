//! Test utilities shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use e2e::core::Step;
use e2e::docker::{BuildContext, ContainerRegistry, ContainerRuntime, ContainerSummary, RuntimeError, SharedContainers};
use e2e::execution::{handler_fn, ExecutionEngine, ExecutionEvent, StepRegistry};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory container runtime that records every call it receives
#[derive(Default)]
pub struct MockRuntime {
    calls: Mutex<Vec<String>>,
    existing: Vec<ContainerSummary>,
    failing: HashSet<&'static str>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the daemon already runs a container with this name
    pub fn with_container(mut self, name: &str, state: &str) -> Self {
        self.existing.push(ContainerSummary {
            id: format!("id-{}", name),
            names: vec![format!("/{}", name)],
            image: "alpine".to_string(),
            state: state.to_string(),
        });
        self
    }

    /// Make every call of the given operation fail
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Calls received so far, as `operation target`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of one operation
    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    fn record(&self, operation: &'static str, target: &str) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().push(format!("{} {}", operation, target));
        if self.failing.contains(operation) {
            return Err(RuntimeError::Command {
                command: format!("docker {}", operation),
                code: 1,
                stderr: format!("{} refused", operation),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.record("ping", "")
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.record("pull", image)
    }

    async fn build(&self, _context: BuildContext, tag: &str) -> Result<(), RuntimeError> {
        self.record("build", tag)
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
        Ok(self.existing.clone())
    }
}

/// Initialize a registry on top of a mock runtime
pub async fn registry_with(runtime: Arc<MockRuntime>) -> ContainerRegistry {
    ContainerRegistry::initialize(runtime).await.unwrap()
}

/// Shared registry on top of a mock runtime
pub async fn shared_registry_with(runtime: Arc<MockRuntime>) -> SharedContainers {
    registry_with(runtime).await.into_shared()
}

/// Log of handler invocations, in order
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Engine with no built-ins and four recording steps:
///
/// - `Succeed` / `Fail` log `succeed` / `fail`; `Fail` returns `"<label> failed"`
/// - `Forget to pass` returns without marking the step passed
/// - `Clean up` logs `cleanup` and passes
pub fn recording_engine() -> (ExecutionEngine, Journal) {
    let journal: Journal = Arc::default();
    let mut registry = StepRegistry::new();

    let log = journal.clone();
    registry
        .register(
            "Succeed",
            handler_fn(move |step| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push("succeed".to_string());
                    step.set_passed();
                    Ok(())
                })
            }),
        )
        .unwrap();

    let log = journal.clone();
    registry
        .register(
            "Fail",
            handler_fn(move |step| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push("fail".to_string());
                    let label = step.get_optional("LABEL").unwrap_or("step").to_string();
                    Err(anyhow::anyhow!("{} failed", label))
                })
            }),
        )
        .unwrap();

    let log = journal.clone();
    registry
        .register(
            "Forget to pass",
            handler_fn(move |_step| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push("forgot".to_string());
                    Ok(())
                })
            }),
        )
        .unwrap();

    let log = journal.clone();
    registry
        .register(
            "Clean up",
            handler_fn(move |step| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push("cleanup".to_string());
                    step.set_passed();
                    Ok(())
                })
            }),
        )
        .unwrap();

    (ExecutionEngine::with_registry(registry), journal)
}

/// Collect the names of the stages that started
pub fn record_started_stages(engine: &mut ExecutionEngine) -> Journal {
    let started: Journal = Arc::default();
    let sink = started.clone();
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::StageStarted { stage, .. } = event {
            sink.lock().unwrap().push(stage);
        }
    });
    started
}

/// Stage filter from names
pub fn filter(stages: &[&str]) -> HashSet<String> {
    stages.iter().map(|s| s.to_string()).collect()
}

/// Entries of a journal
pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// A step with a `LABEL` variable, used by the `Fail` handler in its error
pub fn labelled(description: &str, label: &str) -> Step {
    Step::new(description).with_variable("LABEL", label)
}
