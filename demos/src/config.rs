//! Configuration for the loss demos.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use yolo_loss_burn::YoloLossConfig;

/// Shared configuration of the `bench` and `inspect` demos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Loss configuration, including the grid.
    pub loss: YoloLossConfig,
    /// Images per batch.
    pub batch_size: usize,
    /// Synthetic objects generated per image.
    pub objects_per_image: usize,
    /// Timed iterations for the benchmark.
    pub iterations: usize,
    /// Untimed iterations run before measuring.
    pub warmup_iterations: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            loss: YoloLossConfig::new(),
            batch_size: 16,
            objects_per_image: 3,
            iterations: 20,
            warmup_iterations: 2,
        }
    }
}

impl DemoConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Rejects settings the demos cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "Batch size must be greater than 0");
        ensure!(self.iterations > 0, "Iterations must be greater than 0");
        self.loss.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_config_round_trips_through_json() {
        let config = DemoConfig {
            batch_size: 4,
            ..DemoConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DemoConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.batch_size, 4);
        assert_eq!(parsed.loss.grid.grid_size, 7);
        assert!((parsed.loss.lambda_noobj - 0.5).abs() < 1e-12);
    }

    #[test]
    fn demo_config_validation_covers_loss_settings() {
        assert!(DemoConfig::default().validate().is_ok());

        let config = DemoConfig {
            loss: YoloLossConfig::new().with_lambda_coord(-1.0),
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
