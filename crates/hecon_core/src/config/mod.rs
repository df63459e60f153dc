//! Study configuration
//!
//! A [`Study`] bundles everything one analysis needs: the parameter set, the
//! model structure that turns parameters into per-strategy outcomes, and the
//! analysis settings. It is plain data, so studies load unchanged from any
//! serde format regardless of where they were produced.
//!
//! ```yaml
//! name: Screening programme
//! parameters:
//!   - { name: p_detect, category: probability, base: 0.7 }
//! model:
//!   type: decision_tree
//!   tree:
//!     root: { type: decision, name: choose, options: [...] }
//! settings:
//!   wtp_threshold: 30000
//!   comparator: no screening
//!   intervention: screening
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::{
    DsaConfig, IncrementalAnalysis, PsaConfig, PsaSummary, RunProgress, TornadoResult, analyze,
    default_wtp_threshold, run_dsa, run_psa,
};
use crate::error::{EngineError, Result, StructuralError, ValidationError};
use crate::evaluate::{
    Comparison, CostEffectModel, DecisionTree, MarkovModel, PartitionedSurvivalModel, TreeOption,
};
use crate::model::{CostEffect, ParameterSet, StrategyOutcome};

/// A model under a strategy name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModel<M> {
    pub name: String,
    pub model: M,
}

/// Which backend produces the strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelStructure {
    /// Options of the root decision are the strategies
    DecisionTree { tree: DecisionTree },
    Markov {
        strategies: Vec<NamedModel<MarkovModel>>,
    },
    PartitionedSurvival {
        strategies: Vec<NamedModel<PartitionedSurvivalModel>>,
    },
}

/// Borrowed evaluator for one strategy of a [`ModelStructure`]
#[derive(Debug, Clone, Copy)]
pub enum StrategyModel<'a> {
    Tree(TreeOption<'a>),
    Markov(&'a MarkovModel),
    PartitionedSurvival(&'a PartitionedSurvivalModel),
}

impl CostEffectModel for StrategyModel<'_> {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        match self {
            StrategyModel::Tree(option) => option.evaluate(params),
            StrategyModel::Markov(model) => model.evaluate(params),
            StrategyModel::PartitionedSurvival(model) => model.evaluate(params),
        }
    }
}

impl ModelStructure {
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&str> {
        match self {
            ModelStructure::DecisionTree { tree } => tree.option_names(),
            ModelStructure::Markov { strategies } => names(strategies),
            ModelStructure::PartitionedSurvival { strategies } => names(strategies),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let names = self.strategy_names();
        if names.is_empty() {
            return Err(EngineError::Config("model defines no strategies".to_string()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ValidationError::DuplicateName {
                    kind: "strategy",
                    name: (*name).to_string(),
                }
                .into());
            }
        }
        match self {
            ModelStructure::DecisionTree { tree } => tree.root().validate_structure(),
            ModelStructure::Markov { strategies } => strategies
                .iter()
                .try_for_each(|s| s.model.validate().map_err(EngineError::from)),
            ModelStructure::PartitionedSurvival { strategies } => strategies
                .iter()
                .try_for_each(|s| s.model.validate().map_err(EngineError::from)),
        }
    }

    /// Evaluator for one named strategy
    pub fn strategy(&self, name: &str) -> Result<StrategyModel<'_>> {
        let unknown = || EngineError::from(StructuralError::UnknownStrategy(name.to_string()));
        match self {
            ModelStructure::DecisionTree { tree } => tree
                .option(name)
                .map(StrategyModel::Tree)
                .map_err(|_| unknown()),
            ModelStructure::Markov { strategies } => find(strategies, name)
                .map(StrategyModel::Markov)
                .ok_or_else(unknown),
            ModelStructure::PartitionedSurvival { strategies } => find(strategies, name)
                .map(StrategyModel::PartitionedSurvival)
                .ok_or_else(unknown),
        }
    }

    /// Base-case outcome of every strategy, in declaration order
    pub fn evaluate_all(&self, params: &ParameterSet) -> Result<Vec<StrategyOutcome>> {
        match self {
            ModelStructure::DecisionTree { tree } => tree.evaluate_strategies(params),
            _ => self
                .strategy_names()
                .into_iter()
                .map(|name| {
                    let ce = self.strategy(name)?.evaluate(params)?;
                    Ok(StrategyOutcome::new(name, ce.cost, ce.effect))
                })
                .collect(),
        }
    }
}

fn names<M>(strategies: &[NamedModel<M>]) -> Vec<&str> {
    strategies.iter().map(|s| s.name.as_str()).collect()
}

fn find<'a, M>(strategies: &'a [NamedModel<M>], name: &str) -> Option<&'a M> {
    strategies.iter().find(|s| s.name == name).map(|s| &s.model)
}

/// Options shared by all analyses of a study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_wtp_threshold", alias = "wtpThreshold")]
    pub wtp_threshold: f64,
    /// Strategy under evaluation in DSA/PSA; the second strategy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention: Option<String>,
    /// Reference strategy in DSA/PSA; the first strategy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
    #[serde(default)]
    pub dsa: DsaConfig,
    #[serde(default)]
    pub psa: PsaConfig,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            wtp_threshold: default_wtp_threshold(),
            intervention: None,
            comparator: None,
            dsa: DsaConfig::default(),
            psa: PsaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ParameterSet,
    pub model: ModelStructure,
    #[serde(default)]
    pub settings: AnalysisSettings,
}

impl Study {
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if !self.settings.wtp_threshold.is_finite() {
            return Err(ValidationError::InvalidSetting {
                name: "wtp_threshold",
                value: self.settings.wtp_threshold,
                reason: "must be finite",
            }
            .into());
        }
        self.settings.dsa.validate()?;
        self.settings.psa.validate()?;
        if self.model.strategy_names().len() > 1 {
            self.comparison_names()?;
        }
        Ok(())
    }

    /// Base-case strategy outcomes
    pub fn evaluate(&self) -> Result<Vec<StrategyOutcome>> {
        self.model.evaluate_all(&self.parameters)
    }

    /// Base case ranked with dominance removed
    pub fn incremental(&self) -> Result<IncrementalAnalysis> {
        analyze(&self.evaluate()?, self.settings.wtp_threshold)
    }

    /// (intervention, comparator) names used by DSA and PSA
    pub fn comparison_names(&self) -> Result<(String, String)> {
        let names = self.model.strategy_names();
        let pick = |chosen: &Option<String>, fallback: usize| -> Result<String> {
            match chosen {
                Some(name) => self.model.strategy(name).map(|_| name.clone()),
                None => names.get(fallback).map(|n| (*n).to_string()).ok_or_else(|| {
                    EngineError::Config(
                        "sensitivity analysis needs at least two strategies".to_string(),
                    )
                }),
            }
        };
        let intervention = pick(&self.settings.intervention, 1)?;
        let comparator = pick(&self.settings.comparator, 0)?;
        if intervention == comparator {
            return Err(EngineError::Config(format!(
                "intervention and comparator are both '{intervention}'"
            )));
        }
        Ok((intervention, comparator))
    }

    pub fn run_dsa(&self, progress: Option<&RunProgress>) -> Result<TornadoResult> {
        let (intervention, comparator) = self.comparison_names()?;
        let intervention = self.model.strategy(&intervention)?;
        let comparator = self.model.strategy(&comparator)?;
        let comparison = Comparison::new(&intervention, &comparator);
        run_dsa(
            &self.parameters,
            &comparison,
            &self.settings.dsa,
            self.settings.wtp_threshold,
            progress,
        )
    }

    pub fn run_psa(&self, progress: Option<&RunProgress>) -> Result<PsaSummary> {
        let (intervention, comparator) = self.comparison_names()?;
        let intervention = self.model.strategy(&intervention)?;
        let comparator = self.model.strategy(&comparator)?;
        let comparison = Comparison::new(&intervention, &comparator);
        run_psa(
            &self.parameters,
            &comparison,
            &self.settings.psa,
            self.settings.wtp_threshold,
            progress,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKOV_STUDY: &str = r##"{
        "name": "two arms",
        "parameters": [
            {"name": "p_death", "category": "probability", "base": 0.1, "range": [0.05, 0.2]},
            {"name": "rr", "category": "efficacy", "base": 0.5},
            {"name": "c_drug", "category": "cost", "base": 2000}
        ],
        "model": {
            "type": "markov",
            "strategies": [
                {"name": "usual", "model": {
                    "states": ["alive", "dead"],
                    "transitions": [["#", "p_death"], [0, 1]],
                    "state_costs": [500, 0],
                    "state_utilities": [0.8, 0],
                    "time_horizon": 10
                }},
                {"name": "drug", "model": {
                    "states": ["alive", "dead"],
                    "transitions": [["#", {"param": "p_death", "times": 0.5}], [0, 1]],
                    "state_costs": [{"param": "c_drug", "times": 1.25}, 0],
                    "state_utilities": [0.8, 0],
                    "time_horizon": 10
                }}
            ]
        },
        "settings": {"wtpThreshold": 30000, "dsa": {"parameters": ["p_death", "c_drug"]}}
    }"##;

    fn markov_study() -> Study {
        serde_json::from_str(MARKOV_STUDY).unwrap()
    }

    #[test]
    fn test_markov_study_loads_and_evaluates() {
        let study = markov_study();
        study.validate().unwrap();
        assert_eq!(study.settings.wtp_threshold, 30_000.0);
        assert_eq!(study.settings.psa.iterations, 1000);

        let outcomes = study.evaluate().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "usual");
        assert!(outcomes[1].cost > outcomes[0].cost);
        assert!(outcomes[1].effect > outcomes[0].effect);

        let incremental = study.incremental().unwrap();
        assert_eq!(incremental.frontier().count(), 2);
    }

    #[test]
    fn test_default_comparison_pair() {
        let study = markov_study();
        assert_eq!(study.comparison_names().unwrap(), ("drug".into(), "usual".into()));

        let mut swapped = markov_study();
        swapped.settings.intervention = Some("usual".into());
        swapped.settings.comparator = Some("drug".into());
        assert_eq!(swapped.comparison_names().unwrap(), ("usual".into(), "drug".into()));

        let mut same = markov_study();
        same.settings.comparator = Some("drug".into());
        assert!(matches!(same.comparison_names(), Err(EngineError::Config(_))));

        let mut unknown = markov_study();
        unknown.settings.comparator = Some("nope".into());
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn test_study_dsa_uses_settings() {
        let study = markov_study();
        let tornado = study.run_dsa(None).unwrap();
        assert_eq!(tornado.entries.len(), 2);
        assert_eq!(tornado.wtp_threshold, 30_000.0);
        let base = study.evaluate().unwrap();
        let expected = CostEffect::new(base[1].cost - base[0].cost, base[1].effect - base[0].effect);
        assert!((tornado.base.cost - expected.cost).abs() < 1e-9);
    }

    #[test]
    fn test_study_psa_without_distributions_is_degenerate() {
        let mut study = markov_study();
        study.settings.psa = PsaConfig::default().with_iterations(20).with_seed(1);
        let summary = study.run_psa(None).unwrap();
        assert_eq!(summary.completed, 20);
        assert!(summary.samples.iter().all(|s| s.parameters.is_empty()));
        let first = &summary.samples[0];
        assert!(summary.samples.iter().all(|s| s.cost == first.cost));
    }

    #[test]
    fn test_decision_tree_study() {
        let study: Study = serde_json::from_str(
            r#"{
                "name": "tree",
                "parameters": [],
                "model": {"type": "decision_tree", "tree": {"root": {
                    "type": "decision", "name": "d", "options": [
                        {"type": "terminal", "name": "a", "cost": 1000, "effect": 1.0},
                        {"type": "terminal", "name": "b", "cost": 5000, "effect": 1.5}
                    ]}}}
            }"#,
        )
        .unwrap();
        study.validate().unwrap();
        assert_eq!(study.model.strategy_names(), vec!["a", "b"]);
        let incremental = study.incremental().unwrap();
        let b = incremental.row("b").unwrap();
        assert!((b.icer.unwrap().value - 8000.0).abs() < 1e-9);
        assert!((b.nmb - 70_000.0).abs() < 1e-9);
        assert!(matches!(
            study.model.strategy("c"),
            Err(EngineError::Structural(_))
        ));
    }

    #[test]
    fn test_empty_model_rejected() {
        let study: Study = serde_json::from_str(
            r#"{"name": "x", "parameters": [], "model": {"type": "markov", "strategies": []}}"#,
        )
        .unwrap();
        assert!(matches!(study.validate(), Err(EngineError::Config(_))));
    }
}
