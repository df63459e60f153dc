//! Configuration types for sensitivity analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_WTP_THRESHOLD: f64 = 50_000.0;
pub const DEFAULT_ITERATIONS: usize = 1000;
pub const DEFAULT_WTP_MAX: f64 = 150_000.0;
pub const DEFAULT_WTP_STEP: f64 = 1000.0;
/// Upper bound on CEAC points
pub const MAX_WTP_POINTS: usize = 100_000;
/// Fraction of the base value used when a parameter has no range
pub const DEFAULT_VARIATION: f64 = 0.20;

pub(crate) fn default_wtp_threshold() -> f64 {
    DEFAULT_WTP_THRESHOLD
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_wtp_max() -> f64 {
    DEFAULT_WTP_MAX
}

fn default_wtp_step() -> f64 {
    DEFAULT_WTP_STEP
}

fn default_variation() -> f64 {
    DEFAULT_VARIATION
}

fn default_sweep_points() -> usize {
    10
}

/// One-way (tornado) analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsaConfig {
    /// Explicit [low, high] per parameter; overrides the parameter's own range
    #[serde(default)]
    pub ranges: BTreeMap<String, [f64; 2]>,
    /// Parameters to sweep; all parameters when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    /// Relative swing around the base value when no range is known
    #[serde(default = "default_variation", alias = "defaultVariation")]
    pub default_variation: f64,
    /// Points per parameter for line sweeps
    #[serde(default = "default_sweep_points", alias = "nPoints", alias = "n_points")]
    pub sweep_points: usize,
}

impl Default for DsaConfig {
    fn default() -> Self {
        Self {
            ranges: BTreeMap::new(),
            parameters: None,
            default_variation: DEFAULT_VARIATION,
            sweep_points: default_sweep_points(),
        }
    }
}

impl DsaConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.default_variation >= 0.0 && self.default_variation.is_finite()) {
            return Err(ValidationError::InvalidSetting {
                name: "default_variation",
                value: self.default_variation,
                reason: "must be a non-negative fraction",
            });
        }
        if self.sweep_points < 2 {
            return Err(ValidationError::InvalidSetting {
                name: "sweep_points",
                value: self.sweep_points as f64,
                reason: "a sweep needs at least two points",
            });
        }
        for (name, &[low, high]) in &self.ranges {
            for value in [low, high] {
                if !value.is_finite() {
                    return Err(ValidationError::NonFinite {
                        entity: format!("{name} range"),
                        value,
                    });
                }
            }
            if low > high {
                return Err(ValidationError::OutOfRange {
                    entity: format!("{name} range low"),
                    value: low,
                    min: f64::NEG_INFINITY,
                    max: high,
                });
            }
        }
        Ok(())
    }
}

/// Monte Carlo settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsaConfig {
    #[serde(default = "default_iterations", alias = "nSimulations", alias = "n_simulations")]
    pub iterations: usize,
    /// Seed for reproducible runs; drawn from the OS when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// CEAC upper end
    #[serde(default = "default_wtp_max", alias = "wtpMax")]
    pub wtp_max: f64,
    /// CEAC spacing
    #[serde(default = "default_wtp_step", alias = "wtpStep")]
    pub wtp_step: f64,
}

impl Default for PsaConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            seed: None,
            wtp_max: DEFAULT_WTP_MAX,
            wtp_step: DEFAULT_WTP_STEP,
        }
    }
}

impl PsaConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.iterations == 0 {
            return Err(ValidationError::InvalidSetting {
                name: "iterations",
                value: 0.0,
                reason: "must be at least one",
            });
        }
        if !(self.wtp_max >= 0.0 && self.wtp_max.is_finite()) {
            return Err(ValidationError::InvalidSetting {
                name: "wtp_max",
                value: self.wtp_max,
                reason: "must be non-negative",
            });
        }
        if !(self.wtp_step > 0.0 && self.wtp_step.is_finite()) {
            return Err(ValidationError::InvalidSetting {
                name: "wtp_step",
                value: self.wtp_step,
                reason: "must be positive",
            });
        }
        if self.wtp_max / self.wtp_step >= MAX_WTP_POINTS as f64 {
            return Err(ValidationError::InvalidSetting {
                name: "wtp_step",
                value: self.wtp_step,
                reason: "gives more CEAC points than a run allows",
            });
        }
        Ok(())
    }

    /// WTP values 0, step, 2·step, … up to and including `wtp_max`
    #[must_use]
    pub fn wtp_grid(&self) -> Vec<f64> {
        let steps = (self.wtp_max / self.wtp_step + 1e-9).floor() as usize;
        (0..=steps).map(|k| k as f64 * self.wtp_step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psa_defaults_and_aliases() {
        let config: PsaConfig = serde_json::from_str(r#"{"nSimulations": 250}"#).unwrap();
        assert_eq!(config.iterations, 250);
        assert_eq!(config.seed, None);
        assert_eq!(config.wtp_max, 150_000.0);
        assert_eq!(config.wtp_step, 1000.0);
        assert_eq!(serde_json::from_str::<PsaConfig>("{}").unwrap(), PsaConfig::default());
    }

    #[test]
    fn test_wtp_grid() {
        let grid = PsaConfig::default().wtp_grid();
        assert_eq!(grid.len(), 151);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[150], 150_000.0);

        let odd = PsaConfig {
            wtp_max: 2500.0,
            ..PsaConfig::default()
        };
        assert_eq!(odd.wtp_grid(), vec![0.0, 1000.0, 2000.0]);
    }

    #[test]
    fn test_validation() {
        assert!(PsaConfig::default().with_iterations(0).validate().is_err());
        let bad_step = PsaConfig {
            wtp_step: 0.0,
            ..PsaConfig::default()
        };
        assert!(bad_step.validate().is_err());
        assert!(DsaConfig::default().validate().is_ok());
        let bad = DsaConfig {
            default_variation: -0.1,
            ..DsaConfig::default()
        };
        assert!(bad.validate().is_err());

        let tiny_step = PsaConfig {
            wtp_step: 1e-6,
            ..PsaConfig::default()
        };
        assert!(matches!(
            tiny_step.validate(),
            Err(ValidationError::InvalidSetting { name: "wtp_step", .. })
        ));
    }

    #[test]
    fn test_dsa_range_entries_checked() {
        let mut config = DsaConfig::default();
        config.ranges.insert("c_drug".into(), [1600.0, 800.0]);
        assert!(matches!(config.validate(), Err(ValidationError::OutOfRange { .. })));

        config.ranges.insert("c_drug".into(), [800.0, f64::INFINITY]);
        assert!(matches!(config.validate(), Err(ValidationError::NonFinite { .. })));

        config.ranges.insert("c_drug".into(), [f64::NAN, 1600.0]);
        assert!(config.validate().is_err());

        config.ranges.insert("c_drug".into(), [800.0, 800.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dsa_ranges_deserialize() {
        let config: DsaConfig =
            serde_json::from_str(r#"{"ranges": {"c_drug": [800, 1600]}, "defaultVariation": 0.1}"#)
                .unwrap();
        assert_eq!(config.ranges["c_drug"], [800.0, 1600.0]);
        assert_eq!(config.default_variation, 0.1);
    }
}
