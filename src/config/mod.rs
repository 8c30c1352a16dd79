//! Configuration management for the loopway engine
//!
//! Handles engine limits, output validation and log filtering.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Run engine configuration
    pub engine: EngineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Run engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum executions of a single loop node before the run fails.
    /// `None` keeps loops unbounded.
    pub max_iterations: Option<u64>,
    /// Validate step outputs against their declared shapes
    pub validate_outputs: bool,
    /// Keep a [`StepRecord`](crate::runtime::StepRecord) per execution.
    /// History grows by one cloned output per step execution, so unbounded
    /// loops may want it off.
    pub record_history: bool,
}

/// Logging configuration for the demo entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive (e.g., "info", "loopway=debug")
    pub filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            validate_outputs: true,
            record_history: true,
        }
    }
}

impl EngineConfig {
    /// Engine configuration with a loop iteration guard
    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                max_iterations: std::env::var("LOOPWAY_MAX_ITERATIONS")
                    .ok()
                    .and_then(|raw| raw.trim().parse().ok()),
                validate_outputs: std::env::var("LOOPWAY_VALIDATE_OUTPUTS")
                    .map(|raw| parse_flag(&raw))
                    .unwrap_or(true),
                record_history: std::env::var("LOOPWAY_RECORD_HISTORY")
                    .map(|raw| parse_flag(&raw))
                    .unwrap_or(true),
            },
            logging: LoggingConfig {
                filter: std::env::var("LOOPWAY_LOG").unwrap_or_else(|_| "info".to_string()),
            },
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}
