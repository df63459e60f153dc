use serde::{Deserialize, Serialize};

use super::CostEffectModel;
use crate::discount::{DiscountRates, discount_factor};
use crate::error::{ConsistencyError, Result, ValidationError};
use crate::model::{CostEffect, ParameterCategory, ParameterSet, Value, resolve_probability_row};

/// Allowed drift of total cohort occupancy away from one
pub const MASS_TOLERANCE: f64 = 1e-6;

fn default_cycle_length() -> f64 {
    1.0
}

/// Markov cohort model.
///
/// The cohort starts in `initial` (all mass in the first state when absent)
/// and moves through `transitions` once per cycle for `time_horizon` cycles.
/// Rewards accrue on the occupancy at the end of each cycle and are discounted
/// at the cycle midpoint, which is the half-cycle correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    pub states: Vec<String>,
    /// Row-stochastic matrix; row i holds the probabilities of leaving state i
    #[serde(alias = "transition_matrix", alias = "transitionMatrix")]
    pub transitions: Vec<Vec<Value>>,
    #[serde(alias = "costs", alias = "stateCosts")]
    pub state_costs: Vec<Value>,
    #[serde(alias = "utilities", alias = "stateUtilities")]
    pub state_utilities: Vec<Value>,
    /// Years per cycle
    #[serde(default = "default_cycle_length", alias = "cycleLength")]
    pub cycle_length: f64,
    /// Number of cycles
    #[serde(alias = "timeHorizon")]
    pub time_horizon: usize,
    #[serde(flatten)]
    pub discount: DiscountRates,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "initial_distribution")]
    pub initial: Option<Vec<f64>>,
}

/// Output of a cohort run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovTrace {
    pub total_cost: f64,
    pub total_effect: f64,
    pub undiscounted_cost: f64,
    pub undiscounted_effect: f64,
    /// Occupancy at cycle 0..=horizon; every row sums to one
    pub occupancy: Vec<Vec<f64>>,
    /// Discounted cost and effect of cycles 1..=horizon
    pub cycle_costs: Vec<f64>,
    pub cycle_effects: Vec<f64>,
}

impl MarkovModel {
    #[must_use]
    pub fn new(
        states: Vec<String>,
        transitions: Vec<Vec<Value>>,
        state_costs: Vec<Value>,
        state_utilities: Vec<Value>,
        time_horizon: usize,
    ) -> Self {
        Self {
            states,
            transitions,
            state_costs,
            state_utilities,
            cycle_length: default_cycle_length(),
            time_horizon,
            discount: DiscountRates::default(),
            initial: None,
        }
    }

    #[must_use]
    pub fn with_discount(mut self, discount: DiscountRates) -> Self {
        self.discount = discount;
        self
    }

    #[must_use]
    pub fn with_cycle_length(mut self, cycle_length: f64) -> Self {
        self.cycle_length = cycle_length;
        self
    }

    #[must_use]
    pub fn with_initial(mut self, initial: Vec<f64>) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Shape and setting checks that do not depend on parameter values.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let n = self.states.len();
        if n == 0 {
            return Err(ValidationError::DimensionMismatch {
                entity: "states".to_string(),
                expected: 1,
                found: 0,
            });
        }
        for (i, state) in self.states.iter().enumerate() {
            if self.states[..i].contains(state) {
                return Err(ValidationError::DuplicateName {
                    kind: "state",
                    name: state.clone(),
                });
            }
        }

        let dimension = |entity: String, found: usize| {
            if found == n {
                Ok(())
            } else {
                Err(ValidationError::DimensionMismatch {
                    entity,
                    expected: n,
                    found,
                })
            }
        };
        dimension("transition matrix rows".to_string(), self.transitions.len())?;
        for (state, row) in self.states.iter().zip(&self.transitions) {
            dimension(format!("transition row '{state}'"), row.len())?;
        }
        dimension("state costs".to_string(), self.state_costs.len())?;
        dimension("state utilities".to_string(), self.state_utilities.len())?;

        if !(self.cycle_length > 0.0 && self.cycle_length.is_finite()) {
            return Err(ValidationError::InvalidSetting {
                name: "cycle_length",
                value: self.cycle_length,
                reason: "must be positive",
            });
        }
        self.discount.validate()?;

        if let Some(initial) = &self.initial {
            dimension("initial occupancy".to_string(), initial.len())?;
            for (state, &v) in self.states.iter().zip(initial) {
                ParameterCategory::Probability.check(&format!("initial['{state}']"), v)?;
            }
            let sum: f64 = initial.iter().sum();
            if (sum - 1.0).abs() > MASS_TOLERANCE {
                return Err(ValidationError::ProbabilitySum {
                    entity: "initial occupancy".to_string(),
                    sum,
                    tolerance: MASS_TOLERANCE,
                });
            }
        }
        Ok(())
    }

    /// Run the cohort under the given parameters.
    pub fn simulate(&self, params: &ParameterSet) -> Result<MarkovTrace> {
        self.validate()?;
        let n = self.states.len();

        let mut matrix = Vec::with_capacity(n);
        for (state, row) in self.states.iter().zip(&self.transitions) {
            matrix.push(resolve_probability_row(
                row,
                params,
                &format!("transition row '{state}'"),
            )?);
        }
        let costs = self.resolve_rewards(&self.state_costs, ParameterCategory::Cost, "cost", params)?;
        let utilities =
            self.resolve_rewards(&self.state_utilities, ParameterCategory::Utility, "utility", params)?;

        let mut current = self.initial.clone().unwrap_or_else(|| {
            let mut v = vec![0.0; n];
            v[0] = 1.0;
            v
        });

        let mut trace = MarkovTrace {
            total_cost: 0.0,
            total_effect: 0.0,
            undiscounted_cost: 0.0,
            undiscounted_effect: 0.0,
            occupancy: Vec::with_capacity(self.time_horizon + 1),
            cycle_costs: Vec::with_capacity(self.time_horizon),
            cycle_effects: Vec::with_capacity(self.time_horizon),
        };
        trace.occupancy.push(current.clone());

        for cycle in 1..=self.time_horizon {
            let mut next = vec![0.0; n];
            for (from, row) in current.iter().zip(&matrix) {
                for (to, p) in next.iter_mut().zip(row) {
                    *to += from * p;
                }
            }

            let sum: f64 = next.iter().sum();
            if (sum - 1.0).abs() > MASS_TOLERANCE {
                return Err(ConsistencyError::ProbabilityMassDrift { cycle, sum }.into());
            }

            let cost: f64 = next.iter().zip(&costs).map(|(v, c)| v * c).sum();
            let effect: f64 = next
                .iter()
                .zip(&utilities)
                .map(|(v, u)| v * u * self.cycle_length)
                .sum();

            let midpoint = (cycle as f64 - 0.5) * self.cycle_length;
            let cost_pv = cost * discount_factor(self.discount.discount_rate_cost, midpoint);
            let effect_pv = effect * discount_factor(self.discount.discount_rate_outcome, midpoint);

            trace.undiscounted_cost += cost;
            trace.undiscounted_effect += effect;
            trace.total_cost += cost_pv;
            trace.total_effect += effect_pv;
            trace.cycle_costs.push(cost_pv);
            trace.cycle_effects.push(effect_pv);
            trace.occupancy.push(next.clone());
            current = next;
        }

        Ok(trace)
    }

    fn resolve_rewards(
        &self,
        values: &[Value],
        category: ParameterCategory,
        label: &str,
        params: &ParameterSet,
    ) -> std::result::Result<Vec<f64>, ValidationError> {
        self.states
            .iter()
            .zip(values)
            .map(|(state, value)| {
                let entity = format!("{label}['{state}']");
                let v = value.resolve(params, &entity)?;
                category.check(&entity, v)?;
                Ok(v)
            })
            .collect()
    }
}

impl CostEffectModel for MarkovModel {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        let trace = self.simulate(params)?;
        Ok(CostEffect::new(trace.total_cost, trace.total_effect))
    }
}
