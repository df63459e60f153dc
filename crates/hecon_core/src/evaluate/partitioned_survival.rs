use serde::{Deserialize, Serialize};

use super::CostEffectModel;
use crate::discount::{DiscountRates, discount_factor};
use crate::error::{Result, ValidationError};
use crate::model::{CostEffect, ParameterCategory, ParameterSet, Value};
use crate::survival::SurvivalCurve;

/// Monthly grid
pub const DEFAULT_TIME_STEP: f64 = 1.0 / 12.0;

/// Upper bound on grid points per run
pub const MAX_TIME_POINTS: usize = 100_000;

/// OS may dip this far below PFS from rounding before it counts as a crossing
const CROSSING_TOLERANCE: f64 = 1e-9;

fn default_time_step() -> f64 {
    DEFAULT_TIME_STEP
}

/// Per-year amounts for the two alive states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValues {
    #[serde(alias = "PF", alias = "pf")]
    pub progression_free: Value,
    #[serde(alias = "PD", alias = "pd")]
    pub progressed: Value,
}

impl StateValues {
    #[must_use]
    pub fn new(progression_free: impl Into<Value>, progressed: impl Into<Value>) -> Self {
        Self {
            progression_free: progression_free.into(),
            progressed: progressed.into(),
        }
    }

    fn resolve(
        &self,
        params: &ParameterSet,
        category: ParameterCategory,
        label: &str,
    ) -> std::result::Result<(f64, f64), ValidationError> {
        let get = |value: &Value, state: &str| {
            let entity = format!("{label}.{state}");
            let v = value.resolve(params, &entity)?;
            category.check(&entity, v)?;
            Ok::<_, ValidationError>(v)
        };
        Ok((
            get(&self.progression_free, "progression_free")?,
            get(&self.progressed, "progressed")?,
        ))
    }
}

/// Three-state partitioned survival model (progression-free, progressed, dead).
///
/// Occupancy comes straight from the two curves: PF = PFS(t), PD = OS(t) − PFS(t),
/// dead = 1 − OS(t). Costs and utilities are annual rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionedSurvivalModel {
    pub pfs: SurvivalCurve<Value>,
    pub os: SurvivalCurve<Value>,
    pub costs: StateValues,
    pub utilities: StateValues,
    /// Years
    #[serde(alias = "timeHorizon")]
    pub time_horizon: f64,
    /// Integration step in years
    #[serde(default = "default_time_step", alias = "timeStep")]
    pub time_step: f64,
    #[serde(flatten)]
    pub discount: DiscountRates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalOutcome {
    pub total_cost: f64,
    pub total_effect: f64,
    /// Undiscounted area under the OS curve over the horizon
    pub life_years: f64,
    pub time_points: Vec<f64>,
    pub pfs_curve: Vec<f64>,
    pub os_curve: Vec<f64>,
    /// Progressed-state occupancy at each time point
    pub progressed: Vec<f64>,
}

impl PartitionedSurvivalModel {
    #[must_use]
    pub fn new(
        pfs: SurvivalCurve<Value>,
        os: SurvivalCurve<Value>,
        costs: StateValues,
        utilities: StateValues,
        time_horizon: f64,
    ) -> Self {
        Self {
            pfs,
            os,
            costs,
            utilities,
            time_horizon,
            time_step: DEFAULT_TIME_STEP,
            discount: DiscountRates::default(),
        }
    }

    #[must_use]
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    #[must_use]
    pub fn with_discount(mut self, discount: DiscountRates) -> Self {
        self.discount = discount;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !(self.time_horizon > 0.0 && self.time_horizon.is_finite()) {
            return Err(ValidationError::InvalidSetting {
                name: "time_horizon",
                value: self.time_horizon,
                reason: "must be positive",
            });
        }
        if !(self.time_step > 0.0 && self.time_step <= self.time_horizon) {
            return Err(ValidationError::InvalidSetting {
                name: "time_step",
                value: self.time_step,
                reason: "must be positive and no longer than the horizon",
            });
        }
        if self.time_horizon / self.time_step >= MAX_TIME_POINTS as f64 {
            return Err(ValidationError::InvalidSetting {
                name: "time_step",
                value: self.time_step,
                reason: "gives more time points than a run allows",
            });
        }
        self.discount.validate()
    }

    /// Grid t_k = k·step for k = 0..=N, N = round(horizon / step)
    #[must_use]
    pub fn time_points(&self) -> Vec<f64> {
        let steps = (self.time_horizon / self.time_step).round() as usize;
        (0..=steps).map(|k| k as f64 * self.time_step).collect()
    }

    pub fn run(&self, params: &ParameterSet) -> Result<SurvivalOutcome> {
        self.validate()?;
        let pfs = self.pfs.resolve(params, "pfs")?;
        let os = self.os.resolve(params, "os")?;
        let (cost_pf, cost_pd) = self.costs.resolve(params, ParameterCategory::Cost, "costs")?;
        let (util_pf, util_pd) =
            self.utilities
                .resolve(params, ParameterCategory::Utility, "utilities")?;

        let time_points = self.time_points();
        let pfs_curve = pfs.curve(&time_points);
        let os_curve = os.curve(&time_points);

        let mut progressed = Vec::with_capacity(time_points.len());
        for ((&t, &s_pfs), &s_os) in time_points.iter().zip(&pfs_curve).zip(&os_curve) {
            let pd = s_os - s_pfs;
            if pd < -CROSSING_TOLERANCE {
                return Err(ValidationError::SurvivalCrossing {
                    time: t,
                    pfs: s_pfs,
                    os: s_os,
                }
                .into());
            }
            progressed.push(pd.max(0.0));
        }

        let step = self.time_step;
        let mut total_cost = 0.0;
        let mut total_effect = 0.0;
        let mut life_years = 0.0;
        // Rectangle rule: cell i is valued at its left edge
        for i in 0..time_points.len().saturating_sub(1) {
            let t = time_points[i];
            let pf = pfs_curve[i];
            let pd = progressed[i];
            let cost = (pf * cost_pf + pd * cost_pd) * step;
            let effect = (pf * util_pf + pd * util_pd) * step;
            total_cost += cost * discount_factor(self.discount.discount_rate_cost, t);
            total_effect += effect * discount_factor(self.discount.discount_rate_outcome, t);
            life_years += os_curve[i] * step;
        }

        Ok(SurvivalOutcome {
            total_cost,
            total_effect,
            life_years,
            time_points,
            pfs_curve,
            os_curve,
            progressed,
        })
    }
}

impl CostEffectModel for PartitionedSurvivalModel {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        let outcome = self.run(params)?;
        Ok(CostEffect::new(outcome.total_cost, outcome.total_effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::Parameter;

    fn exponential(rate: f64) -> SurvivalCurve<Value> {
        SurvivalCurve::Exponential { rate: rate.into() }
    }

    fn model() -> PartitionedSurvivalModel {
        PartitionedSurvivalModel::new(
            SurvivalCurve::Weibull {
                shape: 1.2.into(),
                scale: "pfs_scale".into(),
            },
            exponential(0.15),
            StateValues::new("c_pf", 8000.0),
            StateValues::new(0.8, 0.6),
            10.0,
        )
    }

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::efficacy("pfs_scale", 3.0),
            Parameter::cost("c_pf", 30000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_grid_and_curves() {
        let out = model().run(&params()).unwrap();
        assert_eq!(out.time_points.len(), 121);
        assert!((out.time_points[120] - 10.0).abs() < 1e-9);
        assert_eq!(out.pfs_curve[0], 1.0);
        assert_eq!(out.os_curve[0], 1.0);
        for ((pfs, os), pd) in out.pfs_curve.iter().zip(&out.os_curve).zip(&out.progressed) {
            assert!(*pd >= 0.0);
            assert!((pfs + pd - os).abs() < 1e-9 || *pd == 0.0);
        }
    }

    #[test]
    fn test_constant_survival_integrates_exactly() {
        // Nobody progresses or dies: effect = utility × horizon
        let model = PartitionedSurvivalModel::new(
            exponential(0.0),
            exponential(0.0),
            StateValues::new(1000.0, 0.0),
            StateValues::new(0.5, 0.0),
            4.0,
        )
        .with_time_step(0.25)
        .with_discount(DiscountRates::none());
        let out = model.run(&ParameterSet::default()).unwrap();
        assert!((out.total_effect - 2.0).abs() < 1e-12);
        assert!((out.total_cost - 4000.0).abs() < 1e-9);
        assert!((out.life_years - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rectangle_rule_uses_left_edge() {
        let model = PartitionedSurvivalModel::new(
            exponential(0.5),
            exponential(0.5),
            StateValues::new(0.0, 0.0),
            StateValues::new(1.0, 1.0),
            2.0,
        )
        .with_time_step(1.0)
        .with_discount(DiscountRates::none());
        let out = model.run(&ParameterSet::default()).unwrap();
        assert!((out.total_effect - (1.0 + (-0.5_f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_discounting_is_per_stream() {
        let base = model().with_discount(DiscountRates::none()).run(&params()).unwrap();
        let discounted = model()
            .with_discount(DiscountRates::new(0.03, 0.0))
            .run(&params())
            .unwrap();
        assert!(discounted.total_cost < base.total_cost);
        assert!((discounted.total_effect - base.total_effect).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_curves_rejected() {
        let crossing = PartitionedSurvivalModel::new(
            exponential(0.1),
            exponential(0.3),
            StateValues::new(0.0, 0.0),
            StateValues::new(1.0, 0.5),
            5.0,
        );
        match crossing.run(&ParameterSet::default()) {
            Err(EngineError::Validation(ValidationError::SurvivalCrossing { time, pfs, os })) => {
                assert!(time > 0.0);
                assert!(os < pfs);
            }
            other => panic!("expected crossing error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_settings() {
        let mut m = model();
        m.time_step = 0.0;
        assert!(m.validate().is_err());
        let mut m = model();
        m.time_horizon = -1.0;
        assert!(m.validate().is_err());
        // Ten years at a one-second step
        let m = model().with_time_step(1.0 / (365.0 * 86_400.0));
        assert!(matches!(
            m.run(&params()),
            Err(EngineError::Validation(ValidationError::InvalidSetting { name: "time_step", .. }))
        ));

        let bad_utility = params();
        let mut m = model();
        m.utilities = StateValues::new(1.4, 0.6);
        assert!(matches!(
            m.run(&bad_utility),
            Err(EngineError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_deserialize_state_aliases() {
        let m: PartitionedSurvivalModel = serde_json::from_str(
            r#"{
                "pfs": {"family": "exponential", "rate": 0.3},
                "os": {"family": "gompertz", "shape": 0.05, "rate": 0.1},
                "costs": {"PF": 2000, "PD": 500},
                "utilities": {"pf": 0.8, "pd": 0.5},
                "timeHorizon": 5,
                "timeStep": 0.5
            }"#,
        )
        .unwrap();
        assert_eq!(m.time_step, 0.5);
        assert_eq!(m.discount, DiscountRates::default());
        assert_eq!(m.time_points().len(), 11);
    }
}
