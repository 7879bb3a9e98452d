//! Docker client configuration

/// Environment variable the Docker tooling reads the daemon address from
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Configuration for the docker CLI client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerClientConfig {
    /// Path to the `docker` executable
    pub binary: String,

    /// Daemon address passed as `--host`; `None` uses the CLI's own default
    pub host: Option<String>,

    /// Timeout for a single docker command, in seconds
    pub timeout_secs: u64,
}

impl Default for DockerClientConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            host: None,
            timeout_secs: 600,
        }
    }
}

impl DockerClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the host taken from `DOCKER_HOST`
    pub fn from_env() -> Self {
        let host = std::env::var(DOCKER_HOST_ENV).ok().filter(|h| !h.is_empty());
        Self {
            host,
            ..Self::default()
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
