//! Sampling grids and sentinel values used by the numeric paths.

use serde::{Deserialize, Serialize};

/// `points` evenly spaced samples over `[start, stop]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGrid {
    pub points: usize,
    pub start: f64,
    pub stop: f64,
}

impl LinearGrid {
    pub fn samples(&self) -> Vec<f64> {
        crate::sampler::linspace(self.start, self.stop, self.points)
    }
}

/// `points` log-spaced samples over `[10^start_decade, 10^stop_decade]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogGrid {
    pub points: usize,
    pub start_decade: f64,
    pub stop_decade: f64,
}

impl LogGrid {
    pub fn samples(&self) -> Vec<f64> {
        crate::sampler::logspace(self.start_decade, self.stop_decade, self.points)
    }
}

/// Values substituted for failed or non-finite samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentinels {
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_magnitude_db")]
    pub magnitude_db: f64,
    #[serde(default)]
    pub phase_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_convolution_grid")]
    pub convolution: LinearGrid,
    #[serde(default = "default_frequency_grid")]
    pub frequency: LogGrid,
    #[serde(default = "default_step_grid")]
    pub step: LinearGrid,
    #[serde(default)]
    pub sentinels: Sentinels,
}

fn default_magnitude_db() -> f64 {
    -100.0
}

fn default_convolution_grid() -> LinearGrid {
    LinearGrid {
        points: 200,
        start: -5.0,
        stop: 5.0,
    }
}

fn default_frequency_grid() -> LogGrid {
    LogGrid {
        points: 100,
        start_decade: -2.0,
        stop_decade: 2.0,
    }
}

fn default_step_grid() -> LinearGrid {
    LinearGrid {
        points: 100,
        start: 0.0,
        stop: 10.0,
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            value: 0.0,
            magnitude_db: default_magnitude_db(),
            phase_deg: 0.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            convolution: default_convolution_grid(),
            frequency: default_frequency_grid(),
            step: default_step_grid(),
            sentinels: Sentinels::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.convolution.points, 200);
        assert_eq!(config.convolution.samples().len(), 200);
        assert_eq!(config.frequency.samples().len(), 100);
        assert_eq!(config.step.samples().len(), 100);
        assert_eq!(config.sentinels.magnitude_db, -100.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"step": {"points": 10, "start": 0.0, "stop": 1.0}}"#)
                .unwrap();
        assert_eq!(config.step.points, 10);
        assert_eq!(config.convolution, EngineConfig::default().convolution);
        assert_eq!(config.sentinels, Sentinels::default());
    }
}
