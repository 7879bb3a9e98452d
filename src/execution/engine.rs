//! Main execution engine - runs a procedure stage by stage

use crate::{
    core::{Procedure, ProcedureError, Settings},
    docker::SharedContainers,
    execution::{
        builtin,
        executor::{describe, StageError, StageExecutor},
        registry::{RegistryError, StepHandler, StepRegistry},
    },
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a run did not pass
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Procedure(#[from] ProcedureError),

    /// An ordinary stage failed; later always-run stages completed
    #[error("Test failed at stage: {0}")]
    FailedAtStage(String),

    /// An always-run stage failed after an earlier failure. The stage's own
    /// error is returned as is.
    #[error(transparent)]
    AlwaysRunStage(StageError),
}

/// Why a stage was not executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not selected by the stage filter
    Filtered,
    /// An earlier stage failed and this one is not always-run
    EarlierFailure,
}

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        procedure: String,
    },
    StageStarted {
        stage: String,
        always_runs: bool,
    },
    StageSkipped {
        stage: String,
        reason: SkipReason,
    },
    StepStarted {
        stage: String,
        description: String,
    },
    StepPassed {
        stage: String,
        description: String,
    },
    StepFailed {
        stage: String,
        description: String,
        error: String,
    },
    StageFinished {
        stage: String,
    },
    StageFailed {
        stage: String,
        error: String,
    },
    RunFinished {
        run_id: Uuid,
        passed: bool,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to registered handlers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<EventHandler>,
}

impl EventBus {
    pub fn subscribe(&mut self, handler: EventHandler) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Runs procedures.
///
/// The engine owns the step registry (seeded with the built-in steps) and,
/// optionally, the container registry that gets attached to every step.
/// Stages run strictly one after another.
pub struct ExecutionEngine {
    registry: StepRegistry,
    containers: Option<SharedContainers>,
    events: EventBus,
}

impl ExecutionEngine {
    /// Create an engine with the built-in steps registered
    pub fn new(settings: &Settings) -> Result<Self, RegistryError> {
        let mut registry = StepRegistry::new();
        builtin::register_defaults(&mut registry, settings)?;
        Ok(Self::with_registry(registry))
    }

    /// Create an engine around an existing registry, without built-ins
    pub fn with_registry(registry: StepRegistry) -> Self {
        Self {
            registry,
            containers: None,
            events: EventBus::default(),
        }
    }

    /// Attach a container registry for steps that manage containers
    pub fn with_containers(mut self, containers: SharedContainers) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn containers(&self) -> Option<&SharedContainers> {
        self.containers.as_ref()
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Add a step handler alongside the built-ins
    pub fn register_step<H>(&mut self, description: &str, handler: H) -> Result<(), RegistryError>
    where
        H: StepHandler + 'static,
    {
        self.registry.register(description, handler)
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(handler));
    }

    /// Load a procedure file and run it
    pub async fn run_file<P: AsRef<Path>>(
        &self,
        path: P,
        stages: &HashSet<String>,
    ) -> Result<(), RunError> {
        let procedure = Procedure::from_file(path)?;
        self.run(&procedure, stages).await
    }

    /// Run a procedure.
    ///
    /// With a non-empty `stages` filter only the named stages are eligible.
    /// After the first failing stage, only eligible always-run stages still
    /// execute; if one of those fails its error is returned as is and the
    /// run ends immediately.
    pub async fn run(&self, procedure: &Procedure, stages: &HashSet<String>) -> Result<(), RunError> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, procedure = %procedure.name, "Starting test run");
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            procedure: procedure.name.clone(),
        });

        let unknown = procedure.unknown_stages(stages);
        if !unknown.is_empty() {
            warn!(stages = ?unknown, "Stage filter names stages the procedure does not have");
        }

        let executor = StageExecutor::new(
            &self.registry,
            self.containers.as_ref(),
            procedure.global_variables.clone(),
            &self.events,
        );

        let mut passed = true;
        let mut failed_stage = String::new();

        for stage in &procedure.stages {
            let selected = stages.is_empty() || stages.contains(&stage.name);

            if !selected {
                self.skip(&stage.name, SkipReason::Filtered);
                continue;
            }

            if passed {
                if executor.execute(stage).await.is_err() {
                    passed = false;
                    failed_stage = stage.name.clone();
                }
            } else if stage.always_runs {
                if let Err(e) = executor.execute(stage).await {
                    error!(run_id = %run_id, stage = %stage.name, "Always-run stage failed: {}", describe(&e));
                    self.events.emit(ExecutionEvent::RunFinished { run_id, passed: false });
                    return Err(RunError::AlwaysRunStage(e));
                }
            } else {
                self.skip(&stage.name, SkipReason::EarlierFailure);
            }
        }

        self.events.emit(ExecutionEvent::RunFinished { run_id, passed });

        if !passed {
            error!(run_id = %run_id, stage = %failed_stage, "Test failed");
            return Err(RunError::FailedAtStage(failed_stage));
        }

        info!(run_id = %run_id, procedure = %procedure.name, "Test passed");
        Ok(())
    }

    fn skip(&self, stage: &str, reason: SkipReason) {
        info!(stage, ?reason, "Skipping stage");
        self.events.emit(ExecutionEvent::StageSkipped {
            stage: stage.to_string(),
            reason,
        });
    }
}
