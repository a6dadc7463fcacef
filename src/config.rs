//! Planner configuration
//!
//! Every subsystem takes its own settings section. The whole tree can be
//! loaded from YAML, and any missing field falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid YAML for this schema
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Statistics store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Base IRI of the statistics vocabulary
    pub namespace: String,
    /// Named graph holding samples and global averages
    pub graph: String,
    /// Raw value that encodes INFINITY in the store
    pub infinity_sentinel: f64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            namespace: "urn:bgp-planner:predstats#".to_string(),
            graph: "urn:bgp-planner:predstats".to_string(),
            infinity_sentinel: -1.0,
        }
    }
}

/// Endpoint sampler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Attempts across the endpoint pool before giving up
    pub max_attempts: usize,
    /// Row cap of the lower-bound count query
    pub lower_bound_cap: u64,
    /// Milliseconds to wait between pool attempts
    pub backoff_ms: u64,
    /// Entries kept in the upper sample limit cache
    pub cache_capacity: usize,
    /// Fixed RNG seed for reproducible sampling
    pub seed: Option<u64>,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lower_bound_cap: 50_000,
            backoff_ms: 0,
            cache_capacity: 10_000,
            seed: None,
        }
    }
}

/// Statistics collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// Result count at which a direction is recorded as INFINITY
    pub results_limit: u64,
    /// Samples to gather per predicate and slot
    pub samples_per_predicate: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            results_limit: 500,
            samples_per_predicate: 10,
        }
    }
}

/// What the optimizer does when no remaining pattern connects to the bound variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectedPolicy {
    /// Append the remainder in input order
    #[default]
    #[serde(alias = "append")]
    AppendRemainder,
    /// Re-seed on the remainder and keep ordering
    #[serde(alias = "components")]
    OptimizeComponents,
    /// Fail with an error
    Reject,
}

/// Join-order optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub disconnected: DisconnectedPolicy,
    /// Cost assigned to a pattern whose subject and object are both bound
    pub existence_check_cost: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            disconnected: DisconnectedPolicy::AppendRemainder,
            existence_check_cost: 0.0,
        }
    }
}

/// Endpoint registry settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Seconds after which a DEAD endpoint is tried again; absent means never
    pub dead_endpoint_ttl_secs: Option<u64>,
}

impl RegistrySettings {
    pub fn dead_endpoint_ttl(&self) -> Option<Duration> {
        self.dead_endpoint_ttl_secs.map(Duration::from_secs)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("bgp-planner/{}", crate::VERSION),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub stats: StatsSettings,
    pub sampler: SamplerSettings,
    pub collector: CollectorSettings,
    pub optimizer: OptimizerSettings,
    pub registry: RegistrySettings,
    pub http: HttpSettings,
}

impl PlannerConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: PlannerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sampler.max_attempts == 0 {
            return Err(ConfigError::Invalid("sampler.max_attempts must be at least 1".to_string()));
        }
        if self.sampler.lower_bound_cap == 0 {
            return Err(ConfigError::Invalid("sampler.lower_bound_cap must be at least 1".to_string()));
        }
        if self.sampler.cache_capacity == 0 {
            return Err(ConfigError::Invalid("sampler.cache_capacity must be at least 1".to_string()));
        }
        if self.collector.results_limit == 0 {
            return Err(ConfigError::Invalid("collector.results_limit must be at least 1".to_string()));
        }
        if !(self.optimizer.existence_check_cost >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "optimizer.existence_check_cost must be non-negative, got {}",
                self.optimizer.existence_check_cost
            )));
        }
        if self.stats.infinity_sentinel >= 0.0 {
            return Err(ConfigError::Invalid(
                "stats.infinity_sentinel must be negative so it cannot collide with a sample".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}
