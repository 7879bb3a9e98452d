//! Procedure execution: step registry, stage executor and run engine

pub mod builtin;
pub mod engine;
pub mod executor;
pub mod registry;

pub use engine::{EventBus, EventHandler, ExecutionEngine, ExecutionEvent, RunError, SkipReason};
pub use executor::{StageError, StageExecutor};
pub use registry::{handler_fn, HandlerFuture, Matcher, RegistryError, StepHandler, StepRegistry};
