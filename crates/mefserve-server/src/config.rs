//! Process configuration.
//!
//! An immutable record read once at startup: an optional TOML file (path
//! from `MEFSERVE_CONFIG`, defaulting to `./mefserve.toml` when present)
//! followed by `MEFSERVE_*` environment overrides. Unknown file keys are
//! rejected so a typo in an option name fails the process instead of
//! silently running with defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use mefserve_engine::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server log verbosity, mapped onto `tracing` level filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// The `tracing_subscriber` filter directive for this level.
    /// `critical` has no tracing equivalent and maps to `error`.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(ConfigError::Invalid(format!("unknown log_level: {other}"))),
        }
    }
}

/// Which decoder backend the server wires in.
///
/// `synthetic` fabricates deterministic signals and is meant for
/// development and integration testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    #[default]
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// gRPC listen port (default: 50051)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prometheus `/metrics` exporter port (default: 9091)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Segments decoded ahead of each access; 0 disables prefetch
    /// (default: 3)
    #[serde(default = "default_n_prefetch")]
    pub n_prefetch: usize,

    /// Cache capacity = n_prefetch * multiplier, floor 1 (default: 5)
    #[serde(default = "default_cache_capacity_multiplier")]
    pub cache_capacity_multiplier: usize,

    /// Prefetch worker pool size (default: 4)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub decoder: DecoderBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            metrics_port: default_metrics_port(),
            n_prefetch: default_n_prefetch(),
            cache_capacity_multiplier: default_cache_capacity_multiplier(),
            max_workers: default_max_workers(),
            log_level: LogLevel::default(),
            decoder: DecoderBackend::default(),
        }
    }
}

fn default_port() -> u16 {
    50051
}

fn default_metrics_port() -> u16 {
    9091
}

fn default_n_prefetch() -> usize {
    3
}

fn default_cache_capacity_multiplier() -> usize {
    5
}

fn default_max_workers() -> usize {
    4
}

impl Config {
    /// Load from `MEFSERVE_CONFIG` (or `./mefserve.toml` if present), then
    /// apply environment overrides, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("MEFSERVE_CONFIG").unwrap_or_else(|_| "mefserve.toml".to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Config::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Unknown keys are rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `MEFSERVE_*` overrides via a lookup function (the environment
    /// in production, a closure in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("cannot parse {name}={value}")))
        }

        if let Some(v) = lookup("MEFSERVE_PORT") {
            self.port = parsed("MEFSERVE_PORT", &v)?;
        }
        if let Some(v) = lookup("MEFSERVE_METRICS_PORT") {
            self.metrics_port = parsed("MEFSERVE_METRICS_PORT", &v)?;
        }
        if let Some(v) = lookup("MEFSERVE_N_PREFETCH") {
            self.n_prefetch = parsed("MEFSERVE_N_PREFETCH", &v)?;
        }
        if let Some(v) = lookup("MEFSERVE_CACHE_CAPACITY_MULTIPLIER") {
            self.cache_capacity_multiplier = parsed("MEFSERVE_CACHE_CAPACITY_MULTIPLIER", &v)?;
        }
        if let Some(v) = lookup("MEFSERVE_MAX_WORKERS") {
            self.max_workers = parsed("MEFSERVE_MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("MEFSERVE_LOG_LEVEL") {
            self.log_level = LogLevel::parse(&v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be >= 1".into()));
        }
        if self.cache_capacity_multiplier == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity_multiplier must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            n_prefetch: self.n_prefetch,
            cache_capacity_multiplier: self.cache_capacity_multiplier,
            max_workers: self.max_workers,
        }
    }
}
