//! Core domain models for procedures
//!
//! This module defines the data structures that represent procedures,
//! stages and steps, how they are decoded from YAML, and the settings the
//! framework loads them with.

pub mod config;
pub mod convert;
pub mod procedure;
pub mod settings;
pub mod step;

pub use config::{ProcedureConfig, ProcedureError};
pub use procedure::*;
pub use settings::Settings;
pub use step::*;
