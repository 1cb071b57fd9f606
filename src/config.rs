// src/config.rs
//
// YAML loading and validation, with built-in defaults for every section.

use crate::types::{
    AlertConfig, BiomechanicsConfig, Config, FacialConfig, KinematicsConfig, LoggingConfig,
    PipelineConfig, PredictorConfig, ServerConfig,
};
use crate::error::SentinelError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the cadence or scoring arithmetic degenerate.
    pub fn validate(&self) -> crate::Result<()> {
        if self.pipeline.secondary_interval == 0 || self.pipeline.frame_skip == 0 {
            return Err(SentinelError::Config(
                "pipeline.secondary_interval and pipeline.frame_skip must be >= 1".into(),
            ));
        }
        if self.kinematics.pixels_per_meter <= 0.0 || self.kinematics.frame_rate <= 0.0 {
            return Err(SentinelError::Config(
                "kinematics.pixels_per_meter and kinematics.frame_rate must be positive".into(),
            ));
        }
        if self.alerts.yellow_threshold > self.alerts.red_threshold {
            return Err(SentinelError::Config(
                "alerts.yellow_threshold must not exceed alerts.red_threshold".into(),
            ));
        }
        if self.alerts.history_capacity == 0 {
            return Err(SentinelError::Config("alerts.history_capacity must be >= 1".into()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            preload_sports: vec!["generic".to_string()],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            secondary_interval: 3,
            frame_skip: 1,
            diagnostics_every: 150,
        }
    }
}

impl Default for BiomechanicsConfig {
    fn default() -> Self {
        Self {
            fatigue_window_seconds: 60.0,
            fatigue_drift_threshold_deg: 8.0,
            fatigue_min_samples: 5,
            min_visibility: 0.0,
        }
    }
}

impl Default for FacialConfig {
    fn default() -> Self {
        Self {
            redness_alert: 0.4,
            paleness_alert: 0.3,
        }
    }
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            pixels_per_meter: 200.0,
            frame_rate: 30.0,
            min_contour_area: 100.0,
            max_contour_area: 5000.0,
            proximity_radius_px: 200.0,
            reference_speed_kmh: 150.0,
            speed_alert_kmh: 80.0,
            high_speed_note_kmh: 120.0,
            min_keypoint_visibility: 0.5,
            history_capacity: 30,
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            synthetic_samples: 5000,
            n_estimators: 100,
            forest_max_depth: 10,
            boosting_max_depth: 5,
            learning_rate: 0.1,
            random_seed: 42,
            impact_proximity_threshold_px: 500.0,
            immediate_probability: 70.0,
            short_term_probability: 40.0,
            short_term_fatigue: 60.0,
        }
    }
}

impl PredictorConfig {
    /// Small training budget for tests and quick local runs.
    pub fn fast() -> Self {
        Self {
            synthetic_samples: 600,
            n_estimators: 8,
            forest_max_depth: 6,
            boosting_max_depth: 3,
            ..Self::default()
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            yellow_threshold: 35.0,
            red_threshold: 70.0,
            cooldown_seconds: 3.0,
            history_capacity: 100,
            history_default_limit: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "injury_sentinel=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "pipeline:\n  secondary_interval: 5\nalerts:\n  cooldown_seconds: 1.5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.secondary_interval, 5);
        assert_eq!(config.pipeline.frame_skip, 1);
        assert_eq!(config.alerts.cooldown_seconds, 1.5);
        assert_eq!(config.alerts.red_threshold, 70.0);
        assert_eq!(config.kinematics.history_capacity, 30);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.pipeline.secondary_interval = 0;
        assert!(matches!(config.validate(), Err(SentinelError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(Config::load("/definitely/not/here.yaml").is_err());
    }
}
