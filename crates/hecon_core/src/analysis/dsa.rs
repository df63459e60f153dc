//! Deterministic one-way sensitivity analysis.
//!
//! Each parameter is moved to the low and high end of its range with all
//! others held at base, and the resulting ICER swing ranks the parameters
//! for a tornado diagram.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::DsaConfig;
use super::progress::RunProgress;
use crate::error::{EngineError, Result, ValidationError};
use crate::evaluate::CostEffectModel;
use crate::model::{CostEffect, Icer, Parameter, ParameterSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoEntry {
    pub parameter: String,
    pub base_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub low_icer: Icer,
    pub high_icer: Icer,
    pub low_nmb: f64,
    pub high_nmb: f64,
    /// |high ICER − low ICER|; infinite when exactly one side is
    #[serde(with = "crate::model::signed_float")]
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoResult {
    pub base: CostEffect,
    pub base_icer: Icer,
    pub wtp_threshold: f64,
    /// Sorted by impact, largest first
    pub entries: Vec<TornadoEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    pub cost: f64,
    pub effect: f64,
    pub icer: Icer,
    pub nmb: f64,
}

/// [low, high] for a parameter: explicit config range, then the parameter's
/// own range, then base ± `default_variation` clamped to the category bounds.
#[must_use]
pub fn parameter_range(param: &Parameter, config: &DsaConfig) -> [f64; 2] {
    if let Some(range) = config.ranges.get(&param.name) {
        return *range;
    }
    if let Some(range) = param.range {
        return range;
    }
    let a = param.base * (1.0 - config.default_variation);
    let b = param.base * (1.0 + config.default_variation);
    let (min, max) = param.category.bounds();
    [a.min(b).clamp(min, max), a.max(b).clamp(min, max)]
}

/// Swing between two ICERs, treating equal infinities as no swing.
#[must_use]
pub fn icer_impact(low: f64, high: f64) -> f64 {
    if low == high {
        0.0
    } else if low.is_infinite() || high.is_infinite() {
        f64::INFINITY
    } else {
        (high - low).abs()
    }
}

/// Run a tornado analysis. `model` returns incremental (Δcost, Δeffect).
pub fn run_dsa<M: CostEffectModel + ?Sized>(
    base: &ParameterSet,
    model: &M,
    config: &DsaConfig,
    wtp_threshold: f64,
    progress: Option<&RunProgress>,
) -> Result<TornadoResult> {
    config.validate()?;
    for name in config.ranges.keys() {
        if base.get(name).is_none() {
            return Err(ValidationError::UnknownParameter(name.clone()).into());
        }
    }
    let selected: Vec<&Parameter> = match &config.parameters {
        Some(names) => names
            .iter()
            .map(|name| {
                base.get(name)
                    .ok_or_else(|| ValidationError::UnknownParameter(name.clone()))
            })
            .collect::<std::result::Result<_, _>>()?,
        None => base.iter().collect(),
    };

    info!(parameters = selected.len(), wtp_threshold, "starting DSA");
    if let Some(p) = progress {
        p.reset(selected.len());
    }

    let base_ce = model.evaluate(base)?;

    let evaluate_entry = |param: &&Parameter| -> Result<TornadoEntry> {
        if let Some(p) = progress.filter(|p| p.is_cancelled()) {
            return Err(EngineError::Cancelled {
                completed: p.completed(),
                requested: p.total(),
            });
        }
        let [low_value, high_value] = parameter_range(param, config);
        let low = model.evaluate(&base.with_value(&param.name, low_value)?)?;
        let high = model.evaluate(&base.with_value(&param.name, high_value)?)?;
        let (low_icer, high_icer) = (low.icer(), high.icer());
        let entry = TornadoEntry {
            parameter: param.name.clone(),
            base_value: param.base,
            low_value,
            high_value,
            low_icer,
            high_icer,
            low_nmb: low.nmb(wtp_threshold),
            high_nmb: high.nmb(wtp_threshold),
            impact: icer_impact(low_icer.value, high_icer.value),
        };
        debug!(parameter = %entry.parameter, impact = entry.impact, "DSA entry");
        if let Some(p) = progress {
            p.increment();
        }
        Ok(entry)
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<TornadoEntry>> = selected.par_iter().map(evaluate_entry).collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<TornadoEntry>> = selected.iter().map(evaluate_entry).collect();

    let mut entries = match results.into_iter().collect::<Result<Vec<_>>>() {
        Ok(entries) => entries,
        Err(e) => {
            if e.is_cancelled() {
                warn!("DSA cancelled");
            }
            return Err(e);
        }
    };

    entries.sort_by(|a, b| {
        b.impact
            .total_cmp(&a.impact)
            .then_with(|| a.parameter.cmp(&b.parameter))
    });

    info!(entries = entries.len(), "DSA complete");
    Ok(TornadoResult {
        base: base_ce,
        base_icer: base_ce.icer(),
        wtp_threshold,
        entries,
    })
}

/// Evaluate `config.sweep_points` evenly spaced values of one parameter
/// across its range.
pub fn one_way_sweep<M: CostEffectModel + ?Sized>(
    base: &ParameterSet,
    model: &M,
    parameter: &str,
    config: &DsaConfig,
    wtp_threshold: f64,
) -> Result<Vec<SweepPoint>> {
    config.validate()?;
    let param = base
        .get(parameter)
        .ok_or_else(|| ValidationError::UnknownParameter(parameter.to_string()))?;
    let [low, high] = parameter_range(param, config);
    let n = config.sweep_points;

    (0..n)
        .map(|i| {
            let value = low + (high - low) * i as f64 / (n - 1) as f64;
            let ce = model.evaluate(&base.with_value(parameter, value)?)?;
            Ok(SweepPoint {
                value,
                cost: ce.cost,
                effect: ce.effect,
                icer: ce.icer(),
                nmb: ce.nmb(wtp_threshold),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::Comparison;

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::cost("c_drug", 4000.0).with_range(2000.0, 8000.0),
            Parameter::utility("u_gain", 0.5),
            Parameter::probability("p_irrelevant", 0.3),
        ])
        .unwrap()
    }

    /// Δcost = c_drug, Δeffect = u_gain
    fn increment(p: &ParameterSet) -> Result<CostEffect> {
        Ok(CostEffect::new(p.value("c_drug")?, p.value("u_gain")?))
    }

    #[test]
    fn test_parameter_range_precedence() {
        let config = DsaConfig::default();
        let set = params();
        assert_eq!(parameter_range(set.get("c_drug").unwrap(), &config), [2000.0, 8000.0]);
        let [lo, hi] = parameter_range(set.get("u_gain").unwrap(), &config);
        assert!((lo - 0.4).abs() < 1e-12 && (hi - 0.6).abs() < 1e-12);

        let mut config = DsaConfig::default();
        config.ranges.insert("c_drug".into(), [3000.0, 5000.0]);
        assert_eq!(parameter_range(set.get("c_drug").unwrap(), &config), [3000.0, 5000.0]);

        // Default swing clamped to [0, 1]
        let high_u = Parameter::utility("u", 0.95);
        assert_eq!(parameter_range(&high_u, &DsaConfig::default())[1], 1.0);
        // Negative bases keep low below high
        let log_hr = Parameter::efficacy("log_hr", -0.5);
        let [lo, hi] = parameter_range(&log_hr, &DsaConfig::default());
        assert!(lo < hi);
    }

    #[test]
    fn test_tornado_ordering() {
        let result = run_dsa(&params(), &increment, &DsaConfig::default(), 50_000.0, None).unwrap();
        assert!((result.base_icer.value - 8000.0).abs() < 1e-9);
        let names: Vec<&str> = result.entries.iter().map(|e| e.parameter.as_str()).collect();
        assert_eq!(names, vec!["c_drug", "u_gain", "p_irrelevant"]);

        let c = &result.entries[0];
        assert!((c.low_icer.value - 4000.0).abs() < 1e-9);
        assert!((c.high_icer.value - 16_000.0).abs() < 1e-9);
        assert!((c.impact - 12_000.0).abs() < 1e-9);
        assert!((c.low_nmb - (0.5 * 50_000.0 - 2000.0)).abs() < 1e-9);

        let u = &result.entries[1];
        assert!((u.impact - (8000.0 / 0.4 - 8000.0 / 0.6) * 0.5).abs() < 1e-6);
        assert_eq!(result.entries[2].impact, 0.0);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let set = ParameterSet::new(vec![
            Parameter::cost("zeta", 1.0),
            Parameter::cost("alpha", 1.0),
        ])
        .unwrap();
        let flat = |_: &ParameterSet| -> Result<CostEffect> { Ok(CostEffect::new(1.0, 1.0)) };
        let result = run_dsa(&set, &flat, &DsaConfig::default(), 1.0, None).unwrap();
        assert_eq!(result.entries[0].parameter, "alpha");
        assert_eq!(result.entries[1].parameter, "zeta");
    }

    #[test]
    fn test_infinite_impact() {
        // At the low end the increment in effect vanishes
        let set = ParameterSet::new(vec![Parameter::efficacy("gain", 0.1).with_range(0.0, 0.2)]).unwrap();
        let model = |p: &ParameterSet| -> Result<CostEffect> { Ok(CostEffect::new(100.0, p.value("gain")?)) };
        let result = run_dsa(&set, &model, &DsaConfig::default(), 1.0, None).unwrap();
        let entry = &result.entries[0];
        assert!(entry.low_icer.effect_tied);
        assert_eq!(entry.impact, f64::INFINITY);
        assert_eq!(icer_impact(f64::INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_with_comparison() {
        let new = |p: &ParameterSet| -> Result<CostEffect> { Ok(CostEffect::new(p.value("c_drug")? + 1000.0, 1.5)) };
        let old = |_: &ParameterSet| -> Result<CostEffect> { Ok(CostEffect::new(1000.0, 1.0)) };
        let comparison = Comparison::new(&new, &old);
        let config = DsaConfig {
            parameters: Some(vec!["c_drug".into()]),
            ..DsaConfig::default()
        };
        let result = run_dsa(&params(), &comparison, &config, 50_000.0, None).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert!((result.base_icer.value - 8000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_and_invalid_ranges() {
        let mut config = DsaConfig::default();
        config.ranges.insert("nope".into(), [0.0, 1.0]);
        assert!(matches!(
            run_dsa(&params(), &increment, &config, 1.0, None),
            Err(EngineError::Validation(ValidationError::UnknownParameter(_)))
        ));

        let mut config = DsaConfig::default();
        config.ranges.insert("u_gain".into(), [0.2, 1.3]);
        assert!(matches!(
            run_dsa(&params(), &increment, &config, 1.0, None),
            Err(EngineError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_cancelled_run() {
        let progress = RunProgress::new(0);
        progress.cancel();
        let err = run_dsa(&params(), &increment, &DsaConfig::default(), 1.0, Some(&progress))
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_progress_counts_parameters() {
        let progress = RunProgress::new(0);
        run_dsa(&params(), &increment, &DsaConfig::default(), 1.0, Some(&progress)).unwrap();
        assert_eq!(progress.completed(), 3);
        assert_eq!(progress.total(), 3);
    }

    #[test]
    fn test_one_way_sweep() {
        let config = DsaConfig {
            sweep_points: 5,
            ..DsaConfig::default()
        };
        let points = one_way_sweep(&params(), &increment, "c_drug", &config, 50_000.0).unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2000.0, 3500.0, 5000.0, 6500.0, 8000.0]);
        assert!((points[4].icer.value - 16_000.0).abs() < 1e-9);
        assert!(one_way_sweep(&params(), &increment, "missing", &config, 1.0).is_err());
    }
}
