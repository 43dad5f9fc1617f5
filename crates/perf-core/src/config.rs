use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub load_test: LoadTestSection,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lt = &self.load_test;
        if lt.concurrency == 0 {
            return Err(ConfigError::Invalid("load_test.concurrency must be > 0".into()));
        }
        if lt.duration_seconds == 0 {
            return Err(ConfigError::Invalid(
                "load_test.duration_seconds must be > 0".into(),
            ));
        }
        if lt.jitter_min_ms > lt.jitter_max_ms {
            return Err(ConfigError::Invalid(format!(
                "load_test.jitter_min_ms ({}) exceeds jitter_max_ms ({})",
                lt.jitter_min_ms, lt.jitter_max_ms
            )));
        }
        if self.target.base_urls.is_empty() {
            return Err(ConfigError::Invalid("target.base_urls must not be empty".into()));
        }
        Ok(())
    }

    /// The immutable value object handed to the orchestrator.
    pub fn load_test_config(&self) -> LoadTestConfig {
        LoadTestConfig {
            concurrency: self.load_test.concurrency,
            duration_seconds: self.load_test.duration_seconds,
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            jitter_min_ms: self.load_test.jitter_min_ms,
            jitter_max_ms: self.load_test.jitter_max_ms,
            grace_period: Duration::from_secs(self.load_test.grace_period_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestSection {
    /// Parallel workers per path
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,
    /// Lower bound of the sleep between worker iterations
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    /// Upper bound (exclusive) of the sleep between worker iterations
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    /// Extra time granted to workers after the deadline before they are aborted
    #[serde(default = "default_grace_period_seconds")]
    pub grace_period_seconds: u64,
}

impl Default for LoadTestSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            duration_seconds: default_duration_seconds(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            grace_period_seconds: default_grace_period_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// REST endpoints for path A (round-robin)
    #[serde(default = "default_base_urls")]
    pub base_urls: Vec<String>,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_urls: default_base_urls(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

fn default_concurrency() -> u32 {
    5
}

fn default_duration_seconds() -> u64 {
    30
}

fn default_jitter_min_ms() -> u64 {
    10
}

fn default_jitter_max_ms() -> u64 {
    60
}

fn default_grace_period_seconds() -> u64 {
    30
}

fn default_base_urls() -> Vec<String> {
    vec!["http://localhost:8080".to_string()]
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_results_dir() -> String {
    "results".to_string()
}

/// Concurrency and duration of one load test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub concurrency: u32,
    pub duration_seconds: u64,
}

impl LoadTestConfig {
    pub fn new(concurrency: u32, duration_seconds: u64) -> Self {
        Self {
            concurrency,
            duration_seconds,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }
}

/// Worker pacing and shutdown knobs that are not part of the run's identity.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub grace_period: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            grace_period: Duration::from_secs(default_grace_period_seconds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config_str = r#"
[load_test]
concurrency = 8
duration_seconds = 60
jitter_min_ms = 5
jitter_max_ms = 25

[target]
base_urls = ["http://localhost:8080", "http://localhost:8081"]
timeout_ms = 2000

[output]
results_dir = "out"
        "#;

        let config = Config::from_toml(config_str).unwrap();
        assert_eq!(config.load_test.concurrency, 8);
        assert_eq!(config.load_test.duration_seconds, 60);
        assert_eq!(config.load_test.grace_period_seconds, 30);
        assert_eq!(config.target.base_urls.len(), 2);
        assert_eq!(config.target.timeout_ms, 2000);
        assert_eq!(config.output.results_dir, "out");

        let lt = config.load_test_config();
        assert_eq!(lt, LoadTestConfig::new(8, 60));
        assert_eq!(config.orchestrator_options().jitter_max_ms, 25);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.load_test.concurrency, 5);
        assert_eq!(config.load_test.duration_seconds, 30);
        assert_eq!(config.target.base_urls, vec!["http://localhost:8080"]);
        assert_eq!(config.output.results_dir, "results");
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = Config::from_toml("[load_test]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn test_rejects_inverted_jitter() {
        let err =
            Config::from_toml("[load_test]\njitter_min_ms = 50\njitter_max_ms = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = Config::from_toml("[load_test\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    }
}
