//! Model evaluators: decision tree, Markov cohort, partitioned survival.
//!
//! Each backend reduces a model structure plus a [`ParameterSet`] to a
//! [`CostEffect`]. The analyzers in [`crate::analysis`] only see the
//! [`CostEffectModel`] capability and never a concrete backend.

mod decision_tree;
mod markov;
mod partitioned_survival;

pub use decision_tree::*;
pub use markov::*;
pub use partitioned_survival::*;

use crate::error::Result;
use crate::model::{CostEffect, ParameterSet};

/// Anything that maps a parameter set to an expected (cost, effect).
///
/// Implementations must be pure: the same parameters always give the same
/// answer, so analyzers may call them from several threads at once.
pub trait CostEffectModel: Sync {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect>;
}

impl<F> CostEffectModel for F
where
    F: Fn(&ParameterSet) -> Result<CostEffect> + Sync,
{
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        self(params)
    }
}

/// Intervention evaluated against a comparator under the same parameters.
///
/// As a [`CostEffectModel`] it yields the increment (Δcost, Δeffect), which is
/// what the sensitivity analyzers turn into ICERs and net benefits.
pub struct Comparison<'a> {
    pub intervention: &'a dyn CostEffectModel,
    pub comparator: &'a dyn CostEffectModel,
}

impl<'a> Comparison<'a> {
    pub fn new(intervention: &'a dyn CostEffectModel, comparator: &'a dyn CostEffectModel) -> Self {
        Self {
            intervention,
            comparator,
        }
    }

    /// Both arms and their difference
    pub fn evaluate_arms(&self, params: &ParameterSet) -> Result<Increment> {
        let intervention = self.intervention.evaluate(params)?;
        let comparator = self.comparator.evaluate(params)?;
        Ok(Increment {
            intervention,
            comparator,
            delta: intervention - comparator,
        })
    }
}

impl CostEffectModel for Comparison<'_> {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        Ok(self.evaluate_arms(params)?.delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Increment {
    pub intervention: CostEffect,
    pub comparator: CostEffect,
    pub delta: CostEffect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;

    #[test]
    fn test_closure_models_compare() {
        let params = ParameterSet::new(vec![Parameter::cost("c_new", 5000.0)]).unwrap();
        let new = |p: &ParameterSet| -> Result<CostEffect> {
            Ok(CostEffect::new(p.value("c_new")?, 1.5))
        };
        let old = |_: &ParameterSet| -> Result<CostEffect> { Ok(CostEffect::new(1000.0, 1.0)) };

        let comparison = Comparison::new(&new, &old);
        let arms = comparison.evaluate_arms(&params).unwrap();
        assert_eq!(arms.intervention, CostEffect::new(5000.0, 1.5));
        assert_eq!(arms.delta, CostEffect::new(4000.0, 0.5));
        assert_eq!(comparison.evaluate(&params).unwrap(), arms.delta);
    }
}
