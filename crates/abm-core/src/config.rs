//! Configuration loading for models.
//!
//! Seed, activation policy and space parameters can be loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::space::Neighborhood;

/// Complete model configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Seed for the model's random stream; drawn from entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Activation policy settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Grid space settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridConfig>,
    /// Continuous space settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous: Option<ContinuousConfig>,
}

impl ModelConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values serde cannot: non-empty stage lists and sane space extents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.policy == PolicyKind::Staged && self.scheduler.stages.is_empty() {
            return Err(ConfigError::Invalid(
                "staged policy needs at least one stage".to_string(),
            ));
        }
        if let Some(grid) = &self.grid {
            if grid.width == 0 || grid.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "grid must be at least 1x1, got {}x{}",
                    grid.width, grid.height
                )));
            }
            if grid.capacity == Some(0) {
                return Err(ConfigError::Invalid("grid capacity must be positive".to_string()));
            }
        }
        if let Some(space) = &self.continuous {
            if !(space.x_min < space.x_max && space.y_min < space.y_max) {
                return Err(ConfigError::Invalid(
                    "continuous space bounds must satisfy min < max".to_string(),
                ));
            }
            if let Some(size) = space.bucket_size {
                if !(size > 0.0 && size.is_finite()) {
                    return Err(ConfigError::Invalid(
                        "bucket_size must be positive".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Activation policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Insertion order
    Sequential,
    /// Fresh shuffle every step
    #[default]
    Random,
    /// Stage on all agents, then advance on all agents
    Simultaneous,
    /// Named stages in order
    Staged,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub policy: PolicyKind,
    /// Stage names, used by the staged policy only
    pub stages: Vec<String>,
    /// Shuffle the agent order at the start of each step
    pub shuffle: bool,
    /// Reshuffle before every stage
    pub shuffle_between_stages: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Random,
            stages: Vec::new(),
            shuffle: false,
            shuffle_between_stages: false,
        }
    }
}

/// Grid space configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Wrap around the edges
    pub torus: bool,
    pub neighborhood: Neighborhood,
    /// Maximum agents per cell; unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            torus: false,
            neighborhood: Neighborhood::Moore,
            capacity: None,
        }
    }
}

/// Continuous space configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousConfig {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Wrap around the edges
    pub torus: bool,
    /// Side length of the neighbor-lookup buckets; derived from the extent when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_size: Option<f64>,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 100.0,
            y_min: 0.0,
            y_max: 100.0,
            torus: false,
            bucket_size: None,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Model Configuration

# Omit to draw a fresh seed on every run
seed = 42

[scheduler]
policy = "random"
stages = []
shuffle = false
shuffle_between_stages = false

[grid]
width = 10
height = 10
torus = false
neighborhood = "moore"
"#
    .to_string()
}
