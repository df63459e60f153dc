//! Cost/effect pairs and the ratios derived from them.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Incremental effects smaller than this are treated as a tie
pub const EFFECT_TIE_TOLERANCE: f64 = 1e-12;

/// Expected cost (currency units) and effect (QALYs or life-years)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEffect {
    pub cost: f64,
    pub effect: f64,
}

impl CostEffect {
    #[must_use]
    pub const fn new(cost: f64, effect: f64) -> Self {
        Self { cost, effect }
    }

    /// Net monetary benefit at a willingness-to-pay threshold
    #[must_use]
    pub fn nmb(&self, wtp: f64) -> f64 {
        net_monetary_benefit(self.cost, self.effect, wtp)
    }

    /// Ratio of cost to effect, treating `self` as an increment
    #[must_use]
    pub fn icer(&self) -> Icer {
        Icer::from_increments(self.cost, self.effect)
    }
}

impl Add for CostEffect {
    type Output = CostEffect;

    fn add(self, rhs: Self) -> Self::Output {
        CostEffect::new(self.cost + rhs.cost, self.effect + rhs.effect)
    }
}

impl Sub for CostEffect {
    type Output = CostEffect;

    fn sub(self, rhs: Self) -> Self::Output {
        CostEffect::new(self.cost - rhs.cost, self.effect - rhs.effect)
    }
}

impl Mul<f64> for CostEffect {
    type Output = CostEffect;

    fn mul(self, rhs: f64) -> Self::Output {
        CostEffect::new(self.cost * rhs, self.effect * rhs)
    }
}

/// Result of evaluating one strategy. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub name: String,
    pub cost: f64,
    pub effect: f64,
}

impl StrategyOutcome {
    #[must_use]
    pub fn new(name: impl Into<String>, cost: f64, effect: f64) -> Self {
        Self {
            name: name.into(),
            cost,
            effect,
        }
    }

    #[must_use]
    pub fn cost_effect(&self) -> CostEffect {
        CostEffect::new(self.cost, self.effect)
    }
}

#[must_use]
#[inline]
pub fn net_monetary_benefit(cost: f64, effect: f64, wtp: f64) -> f64 {
    effect * wtp - cost
}

/// Incremental cost-effectiveness ratio.
///
/// When the incremental effect is zero there is no meaningful ratio: the value
/// is +∞ for a costlier option, −∞ for a cheaper one (0 when costs are also
/// equal) and `effect_tied` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Icer {
    #[serde(with = "signed_float")]
    pub value: f64,
    pub effect_tied: bool,
}

impl Icer {
    #[must_use]
    pub fn from_increments(delta_cost: f64, delta_effect: f64) -> Self {
        if delta_effect.abs() <= EFFECT_TIE_TOLERANCE {
            let value = if delta_cost > 0.0 {
                f64::INFINITY
            } else if delta_cost < 0.0 {
                f64::NEG_INFINITY
            } else {
                0.0
            };
            Icer {
                value,
                effect_tied: true,
            }
        } else {
            Icer {
                value: delta_cost / delta_effect,
                effect_tied: false,
            }
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        !self.effect_tied && self.value.is_finite()
    }
}

/// Serde adapter for ratios that may be infinite.
///
/// JSON has no infinity, so ±∞ and NaN are written as the strings `"inf"`,
/// `"-inf"` and `"nan"`. Plain numbers (including YAML `.inf`) read back as-is.
pub mod signed_float {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" | "+inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(de::Error::custom(format!("expected a number, got '{other}'"))),
            },
        }
    }
}
