//! Framework settings resolved from the environment

use std::path::{Path, PathBuf};

/// Environment variable naming the root directory of procedure files
pub const TEST_DIR_ENV: &str = "TEST_DIR";

/// Environment variable naming the root directory of Dockerfiles
pub const DOCKERFILE_DIR_ENV: &str = "DOCKERFILE_DIR";

const DEFAULT_TEST_DIR: &str = "/home/e2e/tests";
const DEFAULT_DOCKERFILE_DIR: &str = "/home/e2e/Dockerfiles";

/// Locations the framework loads procedures and Dockerfiles from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `<test>.yaml` procedure files
    pub test_dir: PathBuf,

    /// Directory holding Dockerfiles referenced by build steps
    pub dockerfile_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from(DEFAULT_TEST_DIR),
            dockerfile_dir: PathBuf::from(DEFAULT_DOCKERFILE_DIR),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment, falling back to defaults
    /// for unset or empty variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(dir) = lookup(TEST_DIR_ENV).filter(|v| !v.is_empty()) {
            settings.test_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(DOCKERFILE_DIR_ENV).filter(|v| !v.is_empty()) {
            settings.dockerfile_dir = PathBuf::from(dir);
        }
        settings
    }

    pub fn with_test_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_dir = dir.into();
        self
    }

    pub fn with_dockerfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dockerfile_dir = dir.into();
        self
    }

    /// Path of the procedure file for a test name given without extension
    pub fn test_path(&self, test: &str) -> PathBuf {
        self.test_dir.join(format!("{}.yaml", test))
    }

    pub fn dockerfile_path(&self, dockerfile: &str) -> PathBuf {
        self.dockerfile_dir.join(dockerfile)
    }

    pub fn dockerfile_dir(&self) -> &Path {
        &self.dockerfile_dir
    }
}
