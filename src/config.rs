//! Configuration for obfuscation and storage layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{EnftError, Result};
use crate::obfuscation::MaskStrategy;

/// Names of the selection strategies, as accepted by the CLI and config file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Uniform,
    EdgeDetection,
    Cross,
    RandomBlock,
}

impl FromStr for StrategyKind {
    type Err = EnftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" | "grid" => Ok(StrategyKind::Uniform),
            "edge" | "edge-detection" => Ok(StrategyKind::EdgeDetection),
            "cross" => Ok(StrategyKind::Cross),
            "random-block" | "blocks" => Ok(StrategyKind::RandomBlock),
            other => Err(EnftError::Configuration(format!(
                "unknown mask strategy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Uniform => "uniform",
            StrategyKind::EdgeDetection => "edge-detection",
            StrategyKind::Cross => "cross",
            StrategyKind::RandomBlock => "random-block",
        };
        f.write_str(name)
    }
}

/// Tunables for the pixel mask strategies
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationConfig {
    pub default_strategy: StrategyKind,
    /// Number of grid cells along the longer image side
    pub grid_cells: u32,
    pub edge_sensitivity: f32,
    pub cross_thickness_divisor: u32,
    pub block_size: u32,
    /// Each block is hidden with probability `1 / block_one_in`
    pub block_one_in: u32,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::Cross,
            grid_cells: 100,
            edge_sensitivity: 0.7,
            cross_thickness_divisor: 10,
            block_size: 100,
            block_one_in: 5,
        }
    }
}

impl ObfuscationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid_cells == 0 {
            return Err(EnftError::Configuration("grid_cells must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.edge_sensitivity) {
            return Err(EnftError::Configuration(format!(
                "edge_sensitivity must lie in [0, 1], got {}",
                self.edge_sensitivity
            )));
        }
        if self.cross_thickness_divisor == 0 {
            return Err(EnftError::Configuration(
                "cross_thickness_divisor must be positive".to_string(),
            ));
        }
        if self.block_size == 0 || self.block_one_in == 0 {
            return Err(EnftError::Configuration(
                "block_size and block_one_in must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Concrete strategy for an image of the given size.
    /// `seed` is only consumed by the random-block strategy.
    pub fn strategy_for(&self, kind: StrategyKind, width: u32, height: u32, seed: u64) -> MaskStrategy {
        match kind {
            StrategyKind::Uniform => {
                let longest = width.max(height);
                let spacing = longest.div_ceil(self.grid_cells.max(1)).max(2);
                MaskStrategy::UniformGrid { spacing }
            }
            StrategyKind::EdgeDetection => MaskStrategy::EdgeDetection {
                sensitivity: self.edge_sensitivity,
            },
            StrategyKind::Cross => MaskStrategy::CentralCross {
                thickness_divisor: self.cross_thickness_divisor,
            },
            StrategyKind::RandomBlock => MaskStrategy::RandomBlock {
                block_size: self.block_size,
                one_in: self.block_one_in,
                seed,
            },
        }
    }
}

/// Object storage layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub folder: String,
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            folder: "enft".to_string(),
            base_url: "memory://objects".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnftConfig {
    pub obfuscation: ObfuscationConfig,
    pub storage: StorageConfig,
}

impl EnftConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EnftConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.obfuscation.validate()?;
        if self.storage.folder.is_empty() {
            return Err(EnftError::Configuration(
                "storage folder must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
