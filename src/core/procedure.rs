//! Procedure domain model

use crate::core::{config::ProcedureConfig, step::Step};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::config::ProcedureError;

/// A named, ordered group of steps
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,

    /// Run this stage even after an earlier stage has failed
    pub always_runs: bool,

    pub steps: Vec<Step>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            always_runs: false,
            steps: Vec::new(),
        }
    }

    pub fn always_runs(mut self) -> Self {
        self.always_runs = true;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// A complete test definition
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub description: String,

    /// Variables visible to every step of the procedure
    pub global_variables: Arc<HashMap<String, String>>,

    /// Stages in declared order
    pub stages: Vec<Stage>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            global_variables: Arc::new(HashMap::new()),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Decode a procedure from YAML (strict)
    pub fn from_yaml(yaml: &str) -> Result<Self, ProcedureError> {
        Ok(ProcedureConfig::from_yaml(yaml)?.to_procedure())
    }

    /// Read and decode a procedure file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProcedureError> {
        Ok(ProcedureConfig::from_file(path)?.to_procedure())
    }

    pub(crate) fn from_config(config: &ProcedureConfig) -> Self {
        let stages = config
            .stages
            .iter()
            .flatten()
            .map(|stage| Stage {
                name: stage.name.clone(),
                always_runs: stage.always_runs,
                steps: stage
                    .steps
                    .iter()
                    .map(|step| {
                        let mut decoded = Step::new(step.description.clone());
                        decoded.variables = step.variables.clone();
                        decoded
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            global_variables: Arc::new(config.global_variables.clone()),
            stages,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Names of filter entries that match no stage of this procedure
    pub fn unknown_stages<'a>(&self, filter: &'a HashSet<String>) -> Vec<&'a str> {
        let mut unknown: Vec<&str> = filter
            .iter()
            .filter(|name| self.stage(name).is_none())
            .map(String::as_str)
            .collect();
        unknown.sort_unstable();
        unknown
    }

    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }
}
