//! e2e-stages - staged end-to-end test procedures with managed containers

pub mod cli;
pub mod core;
pub mod docker;
pub mod execution;

// Re-export commonly used types
pub use core::{Procedure, ProcedureError, Settings, Stage, Step, StepError};
pub use docker::{ContainerError, ContainerRegistry, ContainerRuntime, DockerCliClient, DockerClientConfig};
pub use execution::{ExecutionEngine, ExecutionEvent, RunError, StepHandler, StepRegistry};
