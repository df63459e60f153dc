//! Closed-form parametric survival functions.
//!
//! Curves are supplied, not fitted. A curve written in a model structure holds
//! [`Value`] slots so its parameters can be varied by DSA/PSA; it is resolved to
//! a `SurvivalCurve<f64>` before evaluation.

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::ValidationError;
use crate::model::{ParameterSet, Value};

/// Gompertz shapes closer to zero than this reduce to the exponential
const GOMPERTZ_SHAPE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SurvivalCurve<V = f64> {
    /// S(t) = exp(−(t/scale)^shape)
    Weibull { shape: V, scale: V },
    /// S(t) = exp(−rate·t)
    Exponential { rate: V },
    /// S(t) = 1 − Φ((ln t − μ)/σ)
    #[serde(alias = "lognormal")]
    LogNormal { mu: V, sigma: V },
    /// S(t) = exp((rate/shape)·(1 − exp(shape·t)))
    Gompertz { shape: V, rate: V },
}

impl<V> SurvivalCurve<V> {
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            SurvivalCurve::Weibull { .. } => "weibull",
            SurvivalCurve::Exponential { .. } => "exponential",
            SurvivalCurve::LogNormal { .. } => "log_normal",
            SurvivalCurve::Gompertz { .. } => "gompertz",
        }
    }
}

impl SurvivalCurve<Value> {
    /// Bind parameter references and validate the resulting curve.
    pub fn resolve(
        &self,
        params: &ParameterSet,
        entity: &str,
    ) -> Result<SurvivalCurve<f64>, ValidationError> {
        let get = |v: &Value, field: &str| v.resolve(params, &format!("{entity}.{field}"));
        let curve = match self {
            SurvivalCurve::Weibull { shape, scale } => SurvivalCurve::Weibull {
                shape: get(shape, "shape")?,
                scale: get(scale, "scale")?,
            },
            SurvivalCurve::Exponential { rate } => SurvivalCurve::Exponential {
                rate: get(rate, "rate")?,
            },
            SurvivalCurve::LogNormal { mu, sigma } => SurvivalCurve::LogNormal {
                mu: get(mu, "mu")?,
                sigma: get(sigma, "sigma")?,
            },
            SurvivalCurve::Gompertz { shape, rate } => SurvivalCurve::Gompertz {
                shape: get(shape, "shape")?,
                rate: get(rate, "rate")?,
            },
        };
        curve.validate()?;
        Ok(curve)
    }
}

impl SurvivalCurve<f64> {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let reason = match *self {
            SurvivalCurve::Weibull { shape, scale } if !(shape > 0.0 && scale > 0.0) => {
                Some("shape and scale must be positive")
            }
            SurvivalCurve::Exponential { rate } if !(rate >= 0.0 && rate.is_finite()) => {
                Some("rate must be non-negative")
            }
            SurvivalCurve::LogNormal { mu, sigma } if !(mu.is_finite() && sigma > 0.0) => {
                Some("sigma must be positive")
            }
            SurvivalCurve::Gompertz { shape, rate } if !(shape.is_finite() && rate > 0.0) => {
                Some("rate must be positive")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(ValidationError::InvalidSurvivalCurve {
                family: self.family(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Probability of surviving past `t` (years). S(t) = 1 for t ≤ 0.
    #[must_use]
    pub fn survival(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 1.0;
        }
        match *self {
            SurvivalCurve::Weibull { shape, scale } => (-(t / scale).powf(shape)).exp(),
            SurvivalCurve::Exponential { rate } => (-rate * t).exp(),
            SurvivalCurve::LogNormal { mu, sigma } => {
                let z = (t.ln() - mu) / sigma;
                // 1 − Φ(z) = erfc(z/√2)/2
                0.5 * erfc(z / SQRT_2)
            }
            SurvivalCurve::Gompertz { shape, rate } => {
                if shape.abs() < GOMPERTZ_SHAPE_EPSILON {
                    (-rate * t).exp()
                } else {
                    ((rate / shape) * (1.0 - (shape * t).exp())).exp()
                }
            }
        }
    }

    /// Survival evaluated at each time point
    #[must_use]
    pub fn curve(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.survival(t)).collect()
    }
}
