//! Network construction parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::Device;

use crate::{PolicyNetError, Result};

/// Configuration for building a [`crate::neural::PolicyNetwork`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of discrete actions
    pub num_actions: i64,
    /// `(width, height, depth)` of one input state
    pub state_shape: (i64, i64, i64),
    /// Seed for libtorch's generator, applied before parameters are drawn
    #[serde(default)]
    pub seed: Option<i64>,
    /// Device the parameters live on (CPU unless set programmatically)
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

fn default_device() -> Device {
    Device::Cpu
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_actions: 4,
            state_shape: (84, 84, 3),
            seed: None,
            device: default_device(),
        }
    }
}

impl NetworkConfig {
    pub fn new(num_actions: i64, state_shape: (i64, i64, i64)) -> Self {
        Self {
            num_actions,
            state_shape,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        log::debug!("loaded network config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_actions <= 0 {
            return Err(PolicyNetError::InvalidConfig(format!(
                "num_actions must be positive, got {}",
                self.num_actions
            )));
        }
        let (width, height, depth) = self.state_shape;
        if width <= 0 || height <= 0 || depth <= 0 {
            return Err(PolicyNetError::InvalidConfig(format!(
                "state_shape dimensions must be positive, got {:?}",
                self.state_shape
            )));
        }
        Ok(())
    }
}
