// Configuration module for reading Snake.toml
// Every tunable threshold and weight of the move pipeline lives here.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::Direction;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub timing: TimingConfig,
    pub pipeline: PipelineConfig,
    pub path_costs: PathCostConfig,
    pub triage: TriageConfig,
    pub appearance: AppearanceConfig,
    pub debug: DebugConfig,
}

/// Response timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimingConfig {
    pub response_time_budget_ms: u64,
    pub network_overhead_ms: u64,
}

impl TimingConfig {
    /// Computes the effective computation budget
    pub fn effective_budget_ms(&self) -> u64 {
        self.response_time_budget_ms.saturating_sub(self.network_overhead_ms)
    }
}

/// Stage gates of the move pipeline
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Below this health the catch-up stage goes for food regardless of size
    pub low_health_threshold: i32,
    /// Below this health food paths may use edges and sticky steps freely
    pub critical_health_threshold: i32,
    /// Opponent heads further than this are not attacked
    pub max_attack_distance: i32,
    /// Move returned when no neighbour of the head is free
    pub default_direction: Direction,
}

/// Step-cost shaping for path search
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PathCostConfig {
    pub edge_penalty: u32,
    pub open_space_weight: u32,
}

/// Weights for scoring space-filling candidates
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TriageConfig {
    pub weight_length: f64,
    pub food_bonus: f64,
    pub threat_penalty: f64,
    pub escape_bonus: f64,
    pub trap_penalty: f64,
    /// Depth of the opponent head distribution used for threat weighting
    pub lookahead_steps: usize,
}

/// Customizations returned from GET /
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppearanceConfig {
    pub author: String,
    pub color: String,
    pub head: String,
    pub tail: String,
}

/// Debug configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Snake.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Snake.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Snake.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Snake.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                response_time_budget_ms: 400,
                network_overhead_ms: 50,
            },
            pipeline: PipelineConfig {
                low_health_threshold: 40,
                critical_health_threshold: 15,
                max_attack_distance: 10,
                default_direction: Direction::Left,
            },
            path_costs: PathCostConfig {
                edge_penalty: 4,
                open_space_weight: 1,
            },
            triage: TriageConfig {
                weight_length: 10.0,
                food_bonus: 25.0,
                threat_penalty: 30.0,
                escape_bonus: 40.0,
                trap_penalty: 500.0,
                lookahead_steps: 2,
            },
            appearance: AppearanceConfig {
                author: "squiggle-snake".to_string(),
                color: "#FF3917".to_string(),
                head: "default".to_string(),
                tail: "default".to_string(),
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "snake_debug.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Snake.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}
