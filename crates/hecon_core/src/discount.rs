//! Discounting helpers shared by the model evaluators.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_DISCOUNT_RATE: f64 = 0.03;

pub(crate) fn default_discount_rate() -> f64 {
    DEFAULT_DISCOUNT_RATE
}

/// Annual discount rates, applied independently to the cost and outcome streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountRates {
    #[serde(default = "default_discount_rate", alias = "discountRateCost")]
    pub discount_rate_cost: f64,
    #[serde(default = "default_discount_rate", alias = "discountRateOutcome")]
    pub discount_rate_outcome: f64,
}

impl Default for DiscountRates {
    fn default() -> Self {
        Self {
            discount_rate_cost: DEFAULT_DISCOUNT_RATE,
            discount_rate_outcome: DEFAULT_DISCOUNT_RATE,
        }
    }
}

impl DiscountRates {
    #[must_use]
    pub const fn new(cost: f64, outcome: f64) -> Self {
        Self {
            discount_rate_cost: cost,
            discount_rate_outcome: outcome,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_rate("discount_rate_cost", self.discount_rate_cost)?;
        check_rate("discount_rate_outcome", self.discount_rate_outcome)
    }
}

fn check_rate(name: &'static str, rate: f64) -> Result<(), ValidationError> {
    if rate.is_finite() && rate > -1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidSetting {
            name,
            value: rate,
            reason: "discount rate must be finite and above -1",
        })
    }
}

/// Present-value multiplier for an amount accrued at `years`
#[must_use]
#[inline]
pub fn discount_factor(rate: f64, years: f64) -> f64 {
    if rate == 0.0 {
        1.0
    } else {
        (1.0 + rate).powf(-years)
    }
}

/// Present value of one unit per year for `years` years, paid at year end
#[must_use]
pub fn annuity_factor(rate: f64, years: f64) -> f64 {
    if rate == 0.0 {
        years
    } else {
        (1.0 - (1.0 + rate).powf(-years)) / rate
    }
}
