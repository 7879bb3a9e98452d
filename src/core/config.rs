//! Procedure file schema (YAML)

use crate::core::Procedure;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading a procedure file
#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("unable to read test file '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test file")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Test file '{0}' does not have any stages to run")]
    MissingStages(String),
}

/// Top-level procedure as written in YAML.
///
/// Decoding is strict: unknown keys anywhere in the document are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProcedureConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Variables available to all steps
    #[serde(default)]
    pub global_variables: HashMap<String, String>,

    /// Required; a document without `stages` fails validation
    #[serde(default)]
    pub stages: Option<Vec<StageConfig>>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,

    #[serde(default)]
    pub always_runs: bool,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepConfig {
    /// Human-readable description, resolved to a handler at run time
    pub description: String,

    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl ProcedureConfig {
    /// Load a procedure from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProcedureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ProcedureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a procedure from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ProcedureError> {
        let config: ProcedureConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the decoded procedure
    pub fn validate(&self) -> Result<(), ProcedureError> {
        let Some(stages) = &self.stages else {
            return Err(ProcedureError::MissingStages(self.name.clone()));
        };

        // Stage names are only a convention, so duplicates are reported but allowed
        let mut seen = HashSet::new();
        for stage in stages {
            if !seen.insert(stage.name.as_str()) {
                warn!(procedure = %self.name, stage = %stage.name, "Duplicate stage name");
            }
        }

        Ok(())
    }

    /// Convert config to a Procedure domain model
    pub fn to_procedure(&self) -> Procedure {
        Procedure::from_config(self)
    }
}
