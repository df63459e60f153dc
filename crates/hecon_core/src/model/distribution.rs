use rand::Rng;
use rand::distr::Distribution as _;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Sampling distribution attached to a parameter for probabilistic analysis.
///
/// Pure and stateless: all randomness comes from the caller's RNG, so the same
/// seed reproduces the same draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Fixed {
        value: f64,
    },
    Normal {
        mean: f64,
        #[serde(alias = "std_dev")]
        sd: f64,
    },
    /// Beta(α, β); the usual choice for probabilities and utilities
    Beta { alpha: f64, beta: f64 },
    /// Gamma with shape k and scale θ; the usual choice for costs
    Gamma { shape: f64, scale: f64 },
    #[serde(alias = "lognormal")]
    LogNormal { mu: f64, sigma: f64 },
    Uniform { min: f64, max: f64 },
}

impl Distribution {
    /// Beta distribution matching a mean and standard error (method of moments).
    pub fn beta_from_moments(mean: f64, se: f64) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidDistribution {
            entity: format!("mean={mean}, se={se}"),
            kind: "beta",
            reason: reason.to_string(),
        };
        if !(mean > 0.0 && mean < 1.0) {
            return Err(invalid("mean must lie strictly between 0 and 1"));
        }
        let variance = se * se;
        if !(se > 0.0) || variance >= mean * (1.0 - mean) {
            return Err(invalid("standard error too large for a beta with this mean"));
        }
        let common = mean * (1.0 - mean) / variance - 1.0;
        Ok(Distribution::Beta {
            alpha: mean * common,
            beta: (1.0 - mean) * common,
        })
    }

    /// Gamma distribution matching a mean and standard error (method of moments).
    pub fn gamma_from_moments(mean: f64, se: f64) -> Result<Self, ValidationError> {
        if !(mean > 0.0 && se > 0.0) {
            return Err(ValidationError::InvalidDistribution {
                entity: format!("mean={mean}, se={se}"),
                kind: "gamma",
                reason: "mean and standard error must be positive".to_string(),
            });
        }
        let variance = se * se;
        Ok(Distribution::Gamma {
            shape: mean * mean / variance,
            scale: variance / mean,
        })
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Fixed { .. } => "fixed",
            Distribution::Normal { .. } => "normal",
            Distribution::Beta { .. } => "beta",
            Distribution::Gamma { .. } => "gamma",
            Distribution::LogNormal { .. } => "log_normal",
            Distribution::Uniform { .. } => "uniform",
        }
    }

    /// Analytic mean, where it has a closed form
    #[must_use]
    pub fn mean(&self) -> f64 {
        match self {
            Distribution::Fixed { value } => *value,
            Distribution::Normal { mean, .. } => *mean,
            Distribution::Beta { alpha, beta } => alpha / (alpha + beta),
            Distribution::Gamma { shape, scale } => shape * scale,
            Distribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Distribution::Uniform { min, max } => (min + max) / 2.0,
        }
    }

    /// Check the arguments without sampling. `entity` names the owning parameter.
    pub fn validate(&self, entity: &str) -> Result<(), ValidationError> {
        let reason = match self {
            Distribution::Fixed { value } if !value.is_finite() => Some("value must be finite"),
            Distribution::Normal { mean, sd } if !mean.is_finite() || !(*sd >= 0.0) => {
                Some("sd must be non-negative and finite")
            }
            Distribution::Beta { alpha, beta } if !(*alpha > 0.0 && *beta > 0.0) => {
                Some("alpha and beta must be positive")
            }
            Distribution::Gamma { shape, scale } if !(*shape > 0.0 && *scale > 0.0) => {
                Some("shape and scale must be positive")
            }
            Distribution::LogNormal { mu, sigma } if !mu.is_finite() || !(*sigma >= 0.0) => {
                Some("sigma must be non-negative and finite")
            }
            Distribution::Uniform { min, max } if !(min.is_finite() && max.is_finite() && min < max) => {
                Some("min must be below max")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(self.invalid(entity, reason)),
            None => Ok(()),
        }
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, entity: &str) -> Result<f64, ValidationError> {
        match self {
            Distribution::Fixed { value } => Ok(*value),
            Distribution::Normal { mean, sd } => rand_distr::Normal::new(*mean, *sd)
                .map(|d| d.sample(rng))
                .map_err(|e| self.invalid(entity, &e.to_string())),
            Distribution::Beta { alpha, beta } => rand_distr::Beta::new(*alpha, *beta)
                .map(|d| d.sample(rng))
                .map_err(|e| self.invalid(entity, &e.to_string())),
            Distribution::Gamma { shape, scale } => rand_distr::Gamma::new(*shape, *scale)
                .map(|d| d.sample(rng))
                .map_err(|e| self.invalid(entity, &e.to_string())),
            Distribution::LogNormal { mu, sigma } => rand_distr::LogNormal::new(*mu, *sigma)
                .map(|d| d.sample(rng))
                .map_err(|e| self.invalid(entity, &e.to_string())),
            Distribution::Uniform { min, max } => rand::distr::Uniform::new(*min, *max)
                .map(|d| d.sample(rng))
                .map_err(|e| self.invalid(entity, &e.to_string())),
        }
    }

    fn invalid(&self, entity: &str, reason: &str) -> ValidationError {
        ValidationError::InvalidDistribution {
            entity: entity.to_string(),
            kind: self.kind(),
            reason: reason.to_string(),
        }
    }
}
