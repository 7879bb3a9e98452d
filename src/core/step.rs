//! Step domain model

use crate::core::convert::{self, ConversionError};
use crate::docker::SharedContainers;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while a handler reads its step's inputs
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Could not find variable '{0}' in step.variables")]
    MissingVariable(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Test Step '{0}' is ill formatted because it contains an odd number of quotes")]
    MalformedDescription(String),

    #[error("Step '{0}' needs a container runtime but none is attached")]
    NoContainerRuntime(String),
}

/// The smallest executable unit of a procedure.
///
/// A step is resolved to a handler by its description. The handler reads
/// the step's variables, may use the attached container registry, and
/// reports its outcome with [`Step::set_passed`] / [`Step::set_failed`].
/// A step that nobody marks as passed counts as failed.
#[derive(Debug, Clone)]
pub struct Step {
    /// Human-readable description, used as the handler lookup key
    pub description: String,

    /// Step-local variables
    pub variables: HashMap<String, String>,

    /// Container registry injected by the executor
    containers: Option<SharedContainers>,

    /// Procedure-wide variables injected by the executor
    globals: Arc<HashMap<String, String>>,

    passed: bool,
}

impl Step {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            variables: HashMap::new(),
            containers: None,
            globals: Arc::new(HashMap::new()),
            passed: false,
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Inject the collaborators a handler may need
    pub(crate) fn attach(
        &mut self,
        containers: Option<SharedContainers>,
        globals: Arc<HashMap<String, String>>,
    ) {
        self.containers = containers;
        self.globals = globals;
    }

    pub fn has_passed(&self) -> bool {
        self.passed
    }

    pub fn set_passed(&mut self) {
        self.passed = true;
    }

    pub fn set_failed(&mut self) {
        self.passed = false;
    }

    /// Mark the step passed when `result` is `Ok`, failed otherwise
    pub fn set_outcome<T, E>(&mut self, result: &Result<T, E>) {
        self.passed = result.is_ok();
    }

    /// The container registry shared by this run
    pub fn containers(&self) -> Result<&SharedContainers, StepError> {
        self.containers
            .as_ref()
            .ok_or_else(|| StepError::NoContainerRuntime(self.description.clone()))
    }

    /// Single-quoted arguments of the description.
    ///
    /// `"Greet 'Alice' and 'Bob'"` yields `["Alice", "Bob"]`.
    pub fn description_arguments(&self) -> Result<Vec<String>, StepError> {
        let parts: Vec<&str> = self.description.split('\'').collect();
        if parts.len() % 2 != 1 {
            return Err(StepError::MalformedDescription(self.description.clone()));
        }
        Ok(parts.iter().skip(1).step_by(2).map(|s| s.to_string()).collect())
    }

    /// Procedure global variable, falling back to the process environment
    pub fn global_variable(&self, name: &str) -> Option<String> {
        self.globals
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    /// Fail unless every named variable is present
    pub fn require_variables(&self, names: &[&str]) -> Result<(), StepError> {
        match names.iter().find(|name| !self.variables.contains_key(**name)) {
            Some(missing) => Err(StepError::MissingVariable(missing.to_string())),
            None => Ok(()),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str, StepError> {
        self.variables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| StepError::MissingVariable(name.to_string()))
    }

    /// Variable value, or `None` when it is not set
    pub fn get_optional(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn get_integer(&self, name: &str) -> Result<i64, StepError> {
        Ok(convert::to_integer(self.get_string(name)?)?)
    }

    pub fn get_f32(&self, name: &str) -> Result<f32, StepError> {
        Ok(convert::to_f32(self.get_string(name)?)?)
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, StepError> {
        Ok(convert::to_f64(self.get_string(name)?)?)
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, StepError> {
        Ok(convert::to_boolean(self.get_string(name)?)?)
    }

    pub fn get_duration(&self, name: &str) -> Result<Duration, StepError> {
        Ok(convert::to_duration(self.get_string(name)?)?)
    }

    pub fn get_string_list(&self, name: &str) -> Result<Vec<String>, StepError> {
        Ok(convert::to_string_list(self.get_string(name)?))
    }

    pub fn get_integer_list(&self, name: &str) -> Result<Vec<i64>, StepError> {
        Ok(convert::to_integer_list(self.get_string(name)?)?)
    }

    pub fn get_f32_list(&self, name: &str) -> Result<Vec<f32>, StepError> {
        Ok(convert::to_f32_list(self.get_string(name)?)?)
    }

    pub fn get_f64_list(&self, name: &str) -> Result<Vec<f64>, StepError> {
        Ok(convert::to_f64_list(self.get_string(name)?)?)
    }

    pub fn get_bool_list(&self, name: &str) -> Result<Vec<bool>, StepError> {
        Ok(convert::to_boolean_list(self.get_string(name)?)?)
    }
}
