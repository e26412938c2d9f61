use crate::{clock::ClockSpeed, types::Seconds};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_frame_rate() -> f64 { 60.0 }
fn default_seed() -> u64 { 42 }
fn default_frames() -> u64 { 600 }

/// Engine run settings. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Frames per simulated second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    #[serde(default)]
    pub speed: ClockSpeed,
    /// Master seed for every entity's random stream.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// How many frames a host runs by default.
    #[serde(default = "default_frames")]
    pub frames: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            speed:      ClockSpeed::Normal,
            seed:       default_seed(),
            frames:     default_frames(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file.
    /// In tests, use EngineConfig::default_test().
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        if config.frame_rate.is_nan() || config.frame_rate <= 0.0 {
            anyhow::bail!("frame_rate must be positive, got {}", config.frame_rate);
        }
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests: 60 Hz, seed 42.
    pub fn default_test() -> Self {
        Self { frames: 120, ..Self::default() }
    }

    /// Seconds per frame at normal speed.
    pub fn step(&self) -> Seconds {
        1.0 / self.frame_rate
    }
}
