//! Incremental cost-effectiveness analysis over a set of strategies.
//!
//! Strategies are ranked by cost, dominated options are removed, and the
//! remaining efficiency frontier is reported with ICERs between neighbours.
//! Net monetary benefit is reported for every strategy, dominated or not.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StructuralError, ValidationError};
use crate::model::{Icer, StrategyOutcome, net_monetary_benefit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominanceStatus {
    NonDominated,
    /// A cheaper strategy is at least as effective
    Dominated,
    /// A mix of its frontier neighbours would do better
    ExtendedlyDominated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalRow {
    pub name: String,
    pub cost: f64,
    pub effect: f64,
    pub status: DominanceStatus,
    /// Previous strategy on the frontier; absent for the cheapest frontier
    /// strategy and for dominated ones
    pub reference: Option<String>,
    pub incremental_cost: Option<f64>,
    pub incremental_effect: Option<f64>,
    pub icer: Option<Icer>,
    pub nmb: f64,
}

/// Strategies in cost order with dominance flags, ICERs and net benefits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalAnalysis {
    pub wtp_threshold: f64,
    pub rows: Vec<IncrementalRow>,
    /// Strategy with the highest net monetary benefit
    pub optimal: Option<String>,
}

impl IncrementalAnalysis {
    /// Rows on the efficiency frontier, cheapest first
    pub fn frontier(&self) -> impl Iterator<Item = &IncrementalRow> {
        self.rows
            .iter()
            .filter(|r| r.status == DominanceStatus::NonDominated)
    }

    #[must_use]
    pub fn row(&self, name: &str) -> Option<&IncrementalRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Frontier strategies as plain outcomes
    #[must_use]
    pub fn frontier_outcomes(&self) -> Vec<StrategyOutcome> {
        self.frontier()
            .map(|r| StrategyOutcome::new(r.name.clone(), r.cost, r.effect))
            .collect()
    }
}

/// Rank strategies and remove dominated options.
pub fn analyze(strategies: &[StrategyOutcome], wtp_threshold: f64) -> Result<IncrementalAnalysis> {
    validate_strategies(strategies)?;

    let mut order: Vec<&StrategyOutcome> = strategies.iter().collect();
    order.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then(b.effect.total_cmp(&a.effect))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut status = vec![DominanceStatus::NonDominated; order.len()];

    // Strict dominance: anything not more effective than a cheaper survivor
    let mut frontier: Vec<usize> = Vec::with_capacity(order.len());
    let mut best_effect = f64::NEG_INFINITY;
    for (i, s) in order.iter().enumerate() {
        if s.effect <= best_effect {
            debug!(strategy = %s.name, "strictly dominated");
            status[i] = DominanceStatus::Dominated;
        } else {
            best_effect = s.effect;
            frontier.push(i);
        }
    }

    // Extended dominance: drop the first non-convex point and re-walk
    let max_passes = order.len();
    let mut passes = 0;
    while let Some(k) = first_non_convex(&order, &frontier) {
        passes += 1;
        if passes > max_passes {
            return Err(StructuralError::DominanceNonTermination(max_passes).into());
        }
        let removed = frontier.remove(k);
        debug!(strategy = %order[removed].name, "extendedly dominated");
        status[removed] = DominanceStatus::ExtendedlyDominated;
    }

    let mut rows: Vec<IncrementalRow> = order
        .iter()
        .zip(&status)
        .map(|(s, &status)| IncrementalRow {
            name: s.name.clone(),
            cost: s.cost,
            effect: s.effect,
            status,
            reference: None,
            incremental_cost: None,
            incremental_effect: None,
            icer: None,
            nmb: net_monetary_benefit(s.cost, s.effect, wtp_threshold),
        })
        .collect();

    for pair in frontier.windows(2) {
        let (prev, next) = (order[pair[0]], order[pair[1]]);
        let delta_cost = next.cost - prev.cost;
        let delta_effect = next.effect - prev.effect;
        let row = &mut rows[pair[1]];
        row.reference = Some(prev.name.clone());
        row.incremental_cost = Some(delta_cost);
        row.incremental_effect = Some(delta_effect);
        row.icer = Some(Icer::from_increments(delta_cost, delta_effect));
    }

    let optimal = rows
        .iter()
        .fold(None::<&IncrementalRow>, |best, row| match best {
            Some(b) if b.nmb >= row.nmb => Some(b),
            _ => Some(row),
        })
        .map(|r| r.name.clone());

    Ok(IncrementalAnalysis {
        wtp_threshold,
        rows,
        optimal,
    })
}

/// Position in `frontier` of the first strategy whose ICER against its
/// predecessor exceeds the ICER of its successor against that predecessor.
fn first_non_convex(order: &[&StrategyOutcome], frontier: &[usize]) -> Option<usize> {
    (1..frontier.len().saturating_sub(1)).find(|&k| {
        let prev = order[frontier[k - 1]];
        let this = order[frontier[k]];
        let next = order[frontier[k + 1]];
        let own = Icer::from_increments(this.cost - prev.cost, this.effect - prev.effect);
        let skip = Icer::from_increments(next.cost - prev.cost, next.effect - prev.effect);
        own.value > skip.value
    })
}

/// One strategy against a fixed comparator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceComparison {
    pub name: String,
    pub cost: f64,
    pub effect: f64,
    pub incremental_cost: f64,
    pub incremental_effect: f64,
    pub icer: Icer,
    pub nmb: f64,
    pub incremental_nmb: f64,
}

/// Compare every other strategy with the named reference, in input order.
pub fn compare_to_reference(
    strategies: &[StrategyOutcome],
    reference: &str,
    wtp_threshold: f64,
) -> Result<Vec<ReferenceComparison>> {
    validate_strategies(strategies)?;
    let base = strategies
        .iter()
        .find(|s| s.name == reference)
        .ok_or_else(|| StructuralError::UnknownStrategy(reference.to_string()))?;
    let base_nmb = net_monetary_benefit(base.cost, base.effect, wtp_threshold);

    Ok(strategies
        .iter()
        .filter(|s| s.name != reference)
        .map(|s| {
            let nmb = net_monetary_benefit(s.cost, s.effect, wtp_threshold);
            let incremental_cost = s.cost - base.cost;
            let incremental_effect = s.effect - base.effect;
            ReferenceComparison {
                name: s.name.clone(),
                cost: s.cost,
                effect: s.effect,
                incremental_cost,
                incremental_effect,
                icer: Icer::from_increments(incremental_cost, incremental_effect),
                nmb,
                incremental_nmb: nmb - base_nmb,
            }
        })
        .collect())
}

fn validate_strategies(strategies: &[StrategyOutcome]) -> std::result::Result<(), ValidationError> {
    for (i, s) in strategies.iter().enumerate() {
        for (field, value) in [("cost", s.cost), ("effect", s.effect)] {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite {
                    entity: format!("{}.{field}", s.name),
                    value,
                });
            }
        }
        if strategies[..i].iter().any(|other| other.name == s.name) {
            return Err(ValidationError::DuplicateName {
                kind: "strategy",
                name: s.name.clone(),
            });
        }
    }
    Ok(())
}
