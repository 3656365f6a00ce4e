//! Configuration for the carve neighborhood-search engine.
//!
//! Load runtime configuration from TOML files to control the worker pool,
//! the shared solution pool and the generator portfolio without code
//! changes.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use carve_config::SearchConfig;
//!
//! let config = SearchConfig::from_toml_str(r#"
//!     num_workers = 8
//!     solution_pool_capacity = 3
//!
//!     [lns]
//!     initial_difficulty = 0.5
//!     initial_deterministic_time = 0.1
//! "#).unwrap();
//!
//! assert_eq!(config.num_workers, 8);
//! assert_eq!(config.lns.initial_difficulty, 0.5);
//! ```
//!
//! Use defaults when the file is missing:
//!
//! ```
//! use carve_config::SearchConfig;
//!
//! let config = SearchConfig::load("carve.toml").unwrap_or_default();
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tuning knobs of the neighborhood (LNS) machinery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LnsConfig {
    /// Starting difficulty (target relaxed fraction) of every generator.
    pub initial_difficulty: f64,
    /// Starting deterministic-time budget per neighborhood solve.
    pub initial_deterministic_time: f64,
    /// Multiplicative growth of the budget after a long non-improving
    /// streak.
    pub deterministic_time_growth: f64,
    /// Ceiling for the grown budget.
    pub max_deterministic_time: f64,
    /// Consecutive non-improving calls before the budget grows.
    pub stall_threshold: u64,
    /// Calls below which a generator keeps an infinite selection score.
    pub min_calls_before_scoring: u64,
}

impl Default for LnsConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 0.5,
            initial_deterministic_time: 0.1,
            deterministic_time_growth: 1.02,
            max_deterministic_time: 10.0,
            stall_threshold: 100,
            min_calls_before_scoring: 10,
        }
    }
}

/// Tuning knobs of the shared clause exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClauseConfig {
    /// Total literal budget per exported batch.
    pub max_batch_literals: usize,
    /// Initial accepted clause length.
    pub initial_max_clause_length: usize,
    /// Hard ceiling on the adaptive accepted length.
    pub max_clause_length: usize,
}

impl Default for ClauseConfig {
    fn default() -> Self {
        Self {
            max_batch_literals: 4096,
            initial_max_clause_length: 8,
            max_clause_length: 64,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of independent worker threads.
    pub num_workers: usize,
    /// Capacity of the shared solution pool.
    pub solution_pool_capacity: usize,
    /// Deterministic-time cadence between `synchronize` sweeps.
    pub synchronization_period: f64,
    /// Accumulate the gap integral on every bound change instead of on the
    /// synchronization cadence.
    pub gap_integral_on_bound_change: bool,
    /// Generator names to disable, if any.
    pub disabled_generators: Vec<String>,
    pub lns: LnsConfig,
    pub clauses: ClauseConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_workers: 8,
            solution_pool_capacity: 3,
            synchronization_period: 0.1,
            gap_integral_on_bound_change: false,
            disabled_generators: Vec::new(),
            lns: LnsConfig::default(),
            clauses: ClauseConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::Invalid("num_workers must be positive".into()));
        }
        if self.solution_pool_capacity == 0 {
            return Err(ConfigError::Invalid(
                "solution_pool_capacity must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.lns.initial_difficulty) {
            return Err(ConfigError::Invalid(
                "lns.initial_difficulty must be in [0, 1]".into(),
            ));
        }
        if self.lns.deterministic_time_growth < 1.0 {
            return Err(ConfigError::Invalid(
                "lns.deterministic_time_growth must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
