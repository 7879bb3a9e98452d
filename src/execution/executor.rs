//! Stage executor - runs the steps of one stage in order

use crate::{
    core::{Stage, Step},
    docker::SharedContainers,
    execution::{
        engine::{EventBus, ExecutionEvent},
        registry::{RegistryError, StepRegistry},
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why a stage stopped early
#[derive(Debug, Error)]
pub enum StageError {
    /// No handler is registered for a step description
    #[error(transparent)]
    Resolve(#[from] RegistryError),

    /// The handler returned an error
    #[error(transparent)]
    Handler(anyhow::Error),

    /// The handler returned without marking the step as passed
    #[error("Step '{0}' has failed")]
    StepFailed(String),
}

/// Error text followed by its causes, the way `{:#}` renders an anyhow error
pub(crate) fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    anyhow::Chain::new(error)
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

/// Executes stages against a step registry
pub struct StageExecutor<'a> {
    registry: &'a StepRegistry,
    containers: Option<&'a SharedContainers>,
    globals: Arc<HashMap<String, String>>,
    events: &'a EventBus,
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        registry: &'a StepRegistry,
        containers: Option<&'a SharedContainers>,
        globals: Arc<HashMap<String, String>>,
        events: &'a EventBus,
    ) -> Self {
        Self {
            registry,
            containers,
            globals,
            events,
        }
    }

    /// Run every step of `stage` in order, stopping at the first one that
    /// cannot be resolved, errors, or does not pass.
    pub async fn execute(&self, stage: &Stage) -> Result<(), StageError> {
        info!(stage = %stage.name, always_runs = stage.always_runs, "Running stage");
        self.events.emit(ExecutionEvent::StageStarted {
            stage: stage.name.clone(),
            always_runs: stage.always_runs,
        });

        for step in &stage.steps {
            if let Err(e) = self.execute_step(&stage.name, step).await {
                let error = describe(&e);
                warn!(stage = %stage.name, "Stage failed: {}", error);
                self.events.emit(ExecutionEvent::StageFailed {
                    stage: stage.name.clone(),
                    error,
                });
                return Err(e);
            }
        }

        info!(stage = %stage.name, "Finished running stage");
        self.events.emit(ExecutionEvent::StageFinished {
            stage: stage.name.clone(),
        });
        Ok(())
    }

    async fn execute_step(&self, stage: &str, step: &Step) -> Result<(), StageError> {
        let handler = self.registry.resolve(&step.description)?;

        // Work on a copy so no outcome outlives this run
        let mut step = step.clone();
        step.attach(self.containers.cloned(), self.globals.clone());

        info!(stage, step = %step.description, "Running step");
        self.events.emit(ExecutionEvent::StepStarted {
            stage: stage.to_string(),
            description: step.description.clone(),
        });

        let outcome = match handler.handle(&mut step).await {
            Err(e) => Err(StageError::Handler(e)),
            Ok(()) if !step.has_passed() => Err(StageError::StepFailed(step.description.clone())),
            Ok(()) => Ok(()),
        };

        match &outcome {
            Ok(()) => {
                info!(stage, step = %step.description, "Finished running step");
                self.events.emit(ExecutionEvent::StepPassed {
                    stage: stage.to_string(),
                    description: step.description.clone(),
                });
            }
            Err(e) => {
                self.events.emit(ExecutionEvent::StepFailed {
                    stage: stage.to_string(),
                    description: step.description.clone(),
                    error: describe(e),
                });
            }
        }

        outcome
    }
}
