//! Probabilistic sensitivity analysis.
//!
//! The run is a map-reduce: every iteration resamples the distributed
//! parameters and evaluates the model independently (map), then
//! [`summarize`] aggregates the completed draws (reduce). Per-iteration seeds
//! are drawn up front from the run seed, so the sample set does not depend on
//! how iterations are spread over threads.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::PsaConfig;
use super::progress::RunProgress;
use super::stats::{interval, mean};
use crate::error::{EngineError, Result};
use crate::evaluate::CostEffectModel;
use crate::model::{EFFECT_TIE_TOLERANCE, Icer, ParameterSet, net_monetary_benefit};

/// One Monte Carlo draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsaSample {
    pub iteration: usize,
    /// Values of the sampled parameters
    pub parameters: BTreeMap<String, f64>,
    pub cost: f64,
    pub effect: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeacPoint {
    pub wtp: f64,
    /// Share of draws with positive net monetary benefit at `wtp`
    pub probability: f64,
}

/// Share of draws in each quadrant of the cost-effectiveness plane.
///
/// North means higher cost, east means higher effect. Zero increments count
/// as south or west.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadrantShares {
    pub north_east: f64,
    /// Costlier and no more effective
    pub north_west: f64,
    /// Cheaper or equal and more effective
    pub south_east: f64,
    pub south_west: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsaSummary {
    /// Seed the run used, reported so any run can be reproduced
    pub seed: u64,
    pub requested: usize,
    pub completed: usize,
    /// True when cancellation stopped the run early
    pub partial: bool,
    pub mean_cost: f64,
    pub mean_effect: f64,
    pub cost_interval: [f64; 2],
    pub effect_interval: [f64; 2],
    /// Ratio of mean cost to mean effect
    pub mean_icer: Icer,
    /// 2.5/97.5 percentiles of the finite per-draw ratios
    pub icer_interval: Option<[f64; 2]>,
    pub wtp_threshold: f64,
    pub probability_cost_effective: f64,
    pub quadrants: QuadrantShares,
    pub ceac: Vec<CeacPoint>,
    pub samples: Vec<PsaSample>,
}

/// Draw a value for every parameter that carries a distribution, in set
/// order. Parameters without one keep their base value.
pub fn sample_parameters<R: Rng + ?Sized>(base: &ParameterSet, rng: &mut R) -> Result<ParameterSet> {
    let mut sampled = base.clone();
    for param in base.iter() {
        if let Some(distribution) = &param.distribution {
            let value = distribution.sample(rng, &param.name)?;
            sampled.set_value(&param.name, value)?;
        }
    }
    Ok(sampled)
}

/// Run PSA. `model` returns incremental (Δcost, Δeffect).
pub fn run_psa<M: CostEffectModel + ?Sized>(
    base: &ParameterSet,
    model: &M,
    config: &PsaConfig,
    wtp_threshold: f64,
    progress: Option<&RunProgress>,
) -> Result<PsaSummary> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(|| rand::rng().next_u64());
    let requested = config.iterations;
    info!(iterations = requested, seed, "starting PSA");

    let mut master = SmallRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..requested).map(|_| master.next_u64()).collect();

    if let Some(p) = progress {
        p.reset(requested);
    }

    let distributed: Vec<&str> = base
        .iter()
        .filter(|p| p.distribution.is_some())
        .map(|p| p.name.as_str())
        .collect();

    let run_iteration = |(iteration, &iteration_seed): (usize, &u64)| -> Result<Option<PsaSample>> {
        if progress.is_some_and(RunProgress::is_cancelled) {
            return Ok(None);
        }
        let mut rng = SmallRng::seed_from_u64(iteration_seed);
        let params = sample_parameters(base, &mut rng)?;
        let ce = model.evaluate(&params)?;
        if let Some(p) = progress {
            p.increment();
        }
        let mut parameters = BTreeMap::new();
        for name in &distributed {
            parameters.insert((*name).to_string(), params.value(name)?);
        }
        Ok(Some(PsaSample {
            iteration,
            parameters,
            cost: ce.cost,
            effect: ce.effect,
        }))
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Option<PsaSample>> = seeds
        .par_iter()
        .enumerate()
        .map(run_iteration)
        .collect::<Result<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Option<PsaSample>> = seeds
        .iter()
        .enumerate()
        .map(run_iteration)
        .collect::<Result<_>>()?;

    let samples: Vec<PsaSample> = results.into_iter().flatten().collect();
    if samples.len() < requested {
        warn!(completed = samples.len(), requested, "PSA cancelled");
        if samples.is_empty() {
            return Err(EngineError::Cancelled {
                completed: 0,
                requested,
            });
        }
    }

    let summary = summarize(samples, config, wtp_threshold, seed, requested);
    info!(
        completed = summary.completed,
        mean_cost = summary.mean_cost,
        mean_effect = summary.mean_effect,
        "PSA complete"
    );
    Ok(summary)
}

/// Aggregate completed draws. Independent of draw order.
#[must_use]
pub fn summarize(
    samples: Vec<PsaSample>,
    config: &PsaConfig,
    wtp_threshold: f64,
    seed: u64,
    requested: usize,
) -> PsaSummary {
    let n = samples.len();
    let costs: Vec<f64> = samples.iter().map(|s| s.cost).collect();
    let effects: Vec<f64> = samples.iter().map(|s| s.effect).collect();
    let mean_cost = mean(&costs);
    let mean_effect = mean(&effects);

    let ratios: Vec<f64> = samples
        .iter()
        .filter(|s| s.effect.abs() > EFFECT_TIE_TOLERANCE)
        .map(|s| s.cost / s.effect)
        .filter(|r| r.is_finite())
        .collect();
    let icer_interval = (!ratios.is_empty()).then(|| interval(&ratios, 0.025, 0.975));

    let share = |pred: &dyn Fn(&PsaSample) -> bool| {
        if n == 0 {
            0.0
        } else {
            samples.iter().filter(|s| pred(s)).count() as f64 / n as f64
        }
    };
    let cost_effective_at =
        |wtp: f64| share(&|s: &PsaSample| net_monetary_benefit(s.cost, s.effect, wtp) > 0.0);

    let quadrants = QuadrantShares {
        north_east: share(&|s: &PsaSample| s.cost > 0.0 && s.effect > 0.0),
        north_west: share(&|s: &PsaSample| s.cost > 0.0 && s.effect <= 0.0),
        south_east: share(&|s: &PsaSample| s.cost <= 0.0 && s.effect > 0.0),
        south_west: share(&|s: &PsaSample| s.cost <= 0.0 && s.effect <= 0.0),
    };

    let ceac = config
        .wtp_grid()
        .into_iter()
        .map(|wtp| CeacPoint {
            wtp,
            probability: cost_effective_at(wtp),
        })
        .collect();
    let probability_cost_effective = cost_effective_at(wtp_threshold);

    PsaSummary {
        seed,
        requested,
        completed: n,
        partial: n < requested,
        mean_cost,
        mean_effect,
        cost_interval: interval(&costs, 0.025, 0.975),
        effect_interval: interval(&effects, 0.025, 0.975),
        mean_icer: Icer::from_increments(mean_cost, mean_effect),
        icer_interval,
        wtp_threshold,
        probability_cost_effective,
        quadrants,
        ceac,
        samples,
    }
}
