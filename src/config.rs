use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Tunables for tracking, data-quality checks and smoothing.
///
/// Every field has a default, so an empty TOML document is a valid config:
///
/// ```toml
/// match_window_divisor = 50.0
/// min_valid_points = 4
///
/// [smoothing]
/// window = 21
/// order = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// The match window is `local_spacing / match_window_divisor`.
    pub match_window_divisor: f64,
    /// Below this many valid points a loaded series is flagged as sparse.
    pub min_valid_points: usize,
    pub smoothing: SmoothingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Odd number of samples in the Savitzky-Golay window.
    pub window: usize,
    /// Polynomial order fitted inside each window.
    pub order: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            match_window_divisor: 50.0,
            min_valid_points: 4,
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: 21, order: 3 }
    }
}

impl DriftConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DriftError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Half-width of the acceptance window for a peak with the given spacing.
    pub fn match_window(&self, local_spacing: f64) -> f64 {
        local_spacing / self.match_window_divisor
    }

    pub fn validate(&self) -> Result<()> {
        if !self.match_window_divisor.is_finite() || self.match_window_divisor <= 0.0 {
            return Err(DriftError::Config(format!(
                "match_window_divisor must be positive, got {}",
                self.match_window_divisor
            )));
        }
        self.smoothing.validate()
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window % 2 != 1 || self.window < 1 {
            return Err(DriftError::Config(format!(
                "smoothing window must be a positive odd number, got {}",
                self.window
            )));
        }
        if self.window < self.order + 2 {
            return Err(DriftError::Config(format!(
                "smoothing window {} is too small for polynomial order {}",
                self.window, self.order
            )));
        }
        Ok(())
    }
}
