//! Model parameters and the value slots that reference them.
//!
//! A [`ParameterSet`] is the unit that DSA and PSA vary: analyzers clone it,
//! substitute one or more values, and hand it back to a model evaluator. Model
//! structures never hold raw numbers directly; they hold [`Value`]s that are
//! resolved against the current parameter set at evaluation time.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::PROBABILITY_TOLERANCE;
use crate::error::ValidationError;

/// What a parameter measures, which fixes its admissible range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterCategory {
    Cost,
    Utility,
    Probability,
    #[serde(alias = "effectiveness")]
    Efficacy,
}

impl ParameterCategory {
    /// Inclusive bounds every value of this category must respect
    #[must_use]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            ParameterCategory::Cost => (0.0, f64::INFINITY),
            ParameterCategory::Utility | ParameterCategory::Probability => (0.0, 1.0),
            ParameterCategory::Efficacy => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// Check `value` against this category's invariant.
    pub fn check(self, entity: &str, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite {
                entity: entity.to_string(),
                value,
            });
        }
        match self {
            ParameterCategory::Cost if value < 0.0 => Err(ValidationError::NegativeCost {
                entity: entity.to_string(),
                value,
            }),
            ParameterCategory::Utility | ParameterCategory::Probability
                if !(0.0..=1.0).contains(&value) =>
            {
                Err(ValidationError::OutOfRange {
                    entity: entity.to_string(),
                    value,
                    min: 0.0,
                    max: 1.0,
                })
            }
            _ => Ok(()),
        }
    }
}

/// A named model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub category: ParameterCategory,
    #[serde(alias = "base_value", alias = "baseValue")]
    pub base: f64,
    /// Optional [low, high] used by deterministic sensitivity analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    /// Optional sampling distribution used by probabilistic sensitivity analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, category: ParameterCategory, base: f64) -> Self {
        Self {
            name: name.into(),
            category,
            base,
            range: None,
            distribution: None,
            unit: None,
            description: None,
        }
    }

    #[must_use]
    pub fn cost(name: impl Into<String>, base: f64) -> Self {
        Self::new(name, ParameterCategory::Cost, base)
    }

    #[must_use]
    pub fn utility(name: impl Into<String>, base: f64) -> Self {
        Self::new(name, ParameterCategory::Utility, base)
    }

    #[must_use]
    pub fn probability(name: impl Into<String>, base: f64) -> Self {
        Self::new(name, ParameterCategory::Probability, base)
    }

    #[must_use]
    pub fn efficacy(name: impl Into<String>, base: f64) -> Self {
        Self::new(name, ParameterCategory::Efficacy, base)
    }

    #[must_use]
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.range = Some([low, high]);
        self
    }

    #[must_use]
    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    /// Validate base value, range, and distribution arguments.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.category.check(&self.name, self.base)?;
        if let Some([low, high]) = self.range {
            self.category.check(&self.name, low)?;
            self.category.check(&self.name, high)?;
            if low > high {
                return Err(ValidationError::OutOfRange {
                    entity: format!("{} range low", self.name),
                    value: low,
                    min: f64::NEG_INFINITY,
                    max: high,
                });
            }
        }
        if let Some(distribution) = &self.distribution {
            distribution.validate(&self.name)?;
        }
        Ok(())
    }
}

/// Ordered, name-indexed collection of parameters.
///
/// Iteration follows insertion order, which keeps seeded sampling reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
    index: FxHashMap<String, usize>,
}

impl ParameterSet {
    /// Build a set, rejecting duplicate names and invalid parameters.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, ValidationError> {
        let mut index = FxHashMap::default();
        for (i, param) in parameters.iter().enumerate() {
            param.validate()?;
            if index.insert(param.name.clone(), i).is_some() {
                return Err(ValidationError::DuplicateName {
                    kind: "parameter",
                    name: param.name.clone(),
                });
            }
        }
        Ok(Self { parameters, index })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    /// Current value of a parameter
    pub fn value(&self, name: &str) -> Result<f64, ValidationError> {
        self.get(name)
            .map(|p| p.base)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))
    }

    /// Replace a parameter's value in place, enforcing its category invariant.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ValidationError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))?;
        let param = &mut self.parameters[i];
        param.category.check(&param.name, value)?;
        param.base = value;
        Ok(())
    }

    /// Copy of this set with one value substituted
    pub fn with_value(&self, name: &str, value: f64) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        next.set_value(name, value)?;
        Ok(next)
    }

    /// Snapshot of all current values keyed by name
    #[must_use]
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.base))
            .collect()
    }
}

impl TryFrom<Vec<Parameter>> for ParameterSet {
    type Error = ValidationError;

    fn try_from(parameters: Vec<Parameter>) -> Result<Self, Self::Error> {
        Self::new(parameters)
    }
}

impl From<ParameterSet> for Vec<Parameter> {
    fn from(set: ParameterSet) -> Self {
        set.parameters
    }
}

/// Marker text for the remainder of a probability row
pub const REMAINDER_MARKER: &str = "#";

/// A numeric slot in a model structure.
///
/// Written in input records as a bare number (`0.2`), a parameter name
/// (`p_death`), a complement (`{complement: p_death}`), a scaled reference
/// (`{param: c_drug, times: 12}`, where a missing `times` means a plain
/// reference), or `"#"` for the remainder of a probability row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ValueRepr", into = "ValueRepr")]
pub enum Value {
    Fixed(f64),
    Param(String),
    Complement(String),
    Scaled { param: String, times: f64 },
    Remainder,
}

impl Value {
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Value::Param(name.into())
    }

    #[must_use]
    pub fn complement(name: impl Into<String>) -> Self {
        Value::Complement(name.into())
    }

    /// Resolve against a parameter set. `entity` names the slot for errors.
    pub fn resolve(&self, params: &ParameterSet, entity: &str) -> Result<f64, ValidationError> {
        let value = match self {
            Value::Fixed(v) => *v,
            Value::Param(name) => params.value(name)?,
            Value::Complement(name) => 1.0 - params.value(name)?,
            Value::Scaled { param, times } => params.value(param)? * times,
            Value::Remainder => {
                return Err(ValidationError::MisplacedRemainder {
                    entity: entity.to_string(),
                    reason: "only branch probabilities and transition rows accept '#'",
                });
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ValidationError::NonFinite {
                entity: entity.to_string(),
                value,
            })
        }
    }

    /// Names of parameters this slot depends on
    pub fn referenced_parameter(&self) -> Option<&str> {
        match self {
            Value::Param(name) | Value::Complement(name) => Some(name),
            Value::Scaled { param, .. } => Some(param),
            Value::Fixed(_) | Value::Remainder => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Fixed(v)
    }
}

impl From<&str> for Value {
    fn from(name: &str) -> Self {
        ValueRepr::Name(name.to_string()).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Number(f64),
    Name(String),
    Complement { complement: String },
    Scaled {
        param: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        times: Option<f64>,
    },
}

impl From<ValueRepr> for Value {
    fn from(repr: ValueRepr) -> Self {
        match repr {
            ValueRepr::Number(v) => Value::Fixed(v),
            ValueRepr::Name(name) if name == REMAINDER_MARKER => Value::Remainder,
            ValueRepr::Name(name) => Value::Param(name),
            ValueRepr::Complement { complement } => Value::Complement(complement),
            ValueRepr::Scaled { param, times: None } => Value::Param(param),
            ValueRepr::Scaled {
                param,
                times: Some(times),
            } => Value::Scaled { param, times },
        }
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Fixed(v) => ValueRepr::Number(v),
            Value::Param(name) => ValueRepr::Name(name),
            Value::Complement(complement) => ValueRepr::Complement { complement },
            Value::Scaled { param, times } => ValueRepr::Scaled {
                param,
                times: Some(times),
            },
            Value::Remainder => ValueRepr::Name(REMAINDER_MARKER.to_string()),
        }
    }
}

/// Resolve a row of probabilities that must sum to one.
///
/// At most one entry may be [`Value::Remainder`]; it receives one minus the sum
/// of the others. Every entry must lie in [0, 1] and the row must sum to one
/// within [`PROBABILITY_TOLERANCE`].
pub fn resolve_probability_row(
    row: &[Value],
    params: &ParameterSet,
    entity: &str,
) -> Result<Vec<f64>, ValidationError> {
    let mut remainder_at = None;
    let mut resolved = Vec::with_capacity(row.len());
    for (i, value) in row.iter().enumerate() {
        if matches!(value, Value::Remainder) {
            if remainder_at.replace(i).is_some() {
                return Err(ValidationError::MisplacedRemainder {
                    entity: entity.to_string(),
                    reason: "at most one '#' entry per row",
                });
            }
            resolved.push(0.0);
            continue;
        }
        let p = value.resolve(params, &format!("{entity}[{i}]"))?;
        ParameterCategory::Probability.check(&format!("{entity}[{i}]"), p)?;
        resolved.push(p);
    }

    let explicit: f64 = resolved.iter().sum();
    if let Some(i) = remainder_at {
        let rest = 1.0 - explicit;
        if rest < -PROBABILITY_TOLERANCE {
            return Err(ValidationError::ProbabilitySum {
                entity: entity.to_string(),
                sum: explicit,
                tolerance: PROBABILITY_TOLERANCE,
            });
        }
        resolved[i] = rest.max(0.0);
    }

    let sum: f64 = resolved.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ValidationError::ProbabilitySum {
            entity: entity.to_string(),
            sum,
            tolerance: PROBABILITY_TOLERANCE,
        });
    }
    Ok(resolved)
}
