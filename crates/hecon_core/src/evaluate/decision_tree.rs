//! Decision-tree backend.
//!
//! A tree is either written nested ([`TreeNode`]) or as a flat list of nodes
//! with parent links ([`FlatNode`]), which is how editors and stores tend to
//! keep it. Both forms end up as the same nested sum type.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::CostEffectModel;
use crate::discount::{DiscountRates, annuity_factor};
use crate::error::{EngineError, Result, StructuralError, ValidationError};
use crate::model::{
    CostEffect, NodeId, ParameterCategory, ParameterSet, StrategyOutcome, Value,
    resolve_probability_row,
};

fn zero() -> Value {
    Value::Fixed(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Choice between strategies. Only valid at the root.
    Decision { name: String, options: Vec<TreeNode> },
    /// Uncertain event. Branch probabilities must sum to one.
    Chance {
        name: String,
        #[serde(default = "zero")]
        cost: Value,
        branches: Vec<Branch>,
    },
    Terminal {
        name: String,
        #[serde(default = "zero")]
        cost: Value,
        #[serde(default = "zero")]
        effect: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub probability: Value,
    pub node: TreeNode,
}

impl Branch {
    #[must_use]
    pub fn new(probability: impl Into<Value>, node: TreeNode) -> Self {
        Self {
            probability: probability.into(),
            node,
        }
    }
}

impl TreeNode {
    #[must_use]
    pub fn terminal(name: impl Into<String>, cost: impl Into<Value>, effect: impl Into<Value>) -> Self {
        TreeNode::Terminal {
            name: name.into(),
            cost: cost.into(),
            effect: effect.into(),
        }
    }

    #[must_use]
    pub fn chance(name: impl Into<String>, cost: impl Into<Value>, branches: Vec<Branch>) -> Self {
        TreeNode::Chance {
            name: name.into(),
            cost: cost.into(),
            branches,
        }
    }

    #[must_use]
    pub fn decision(name: impl Into<String>, options: Vec<TreeNode>) -> Self {
        TreeNode::Decision {
            name: name.into(),
            options,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Decision { name, .. }
            | TreeNode::Chance { name, .. }
            | TreeNode::Terminal { name, .. } => name,
        }
    }

    /// Expected cost and effect of a chance or terminal subtree.
    pub fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        match self {
            TreeNode::Terminal { name, cost, effect } => {
                let cost = cost.resolve(params, &format!("{name}.cost"))?;
                ParameterCategory::Cost.check(&format!("{name}.cost"), cost)?;
                let effect = effect.resolve(params, &format!("{name}.effect"))?;
                Ok(CostEffect::new(cost, effect))
            }
            TreeNode::Chance {
                name,
                cost,
                branches,
            } => {
                if branches.is_empty() {
                    return Err(StructuralError::NoTerminal(name.clone()).into());
                }
                let own_cost = cost.resolve(params, &format!("{name}.cost"))?;
                ParameterCategory::Cost.check(&format!("{name}.cost"), own_cost)?;

                let row: Vec<Value> = branches.iter().map(|b| b.probability.clone()).collect();
                let probabilities = resolve_probability_row(&row, params, name)?;

                let mut expected = CostEffect::new(own_cost, 0.0);
                for (p, branch) in probabilities.iter().zip(branches) {
                    expected = expected + branch.node.evaluate(params)? * *p;
                }
                Ok(expected)
            }
            TreeNode::Decision { name, .. } => {
                Err(StructuralError::DecisionNotReducible(name.clone()).into())
            }
        }
    }

    /// One outcome per option of a root decision, or a single outcome named
    /// after the node for any other root.
    pub fn evaluate_strategies(&self, params: &ParameterSet) -> Result<Vec<StrategyOutcome>> {
        match self {
            TreeNode::Decision { options, .. } => options
                .iter()
                .map(|option| {
                    let ce = option.evaluate(params)?;
                    Ok(StrategyOutcome::new(option.name(), ce.cost, ce.effect))
                })
                .collect(),
            node => {
                let ce = node.evaluate(params)?;
                Ok(vec![StrategyOutcome::new(node.name(), ce.cost, ce.effect)])
            }
        }
    }

    /// Check topology without resolving any values.
    pub fn validate_structure(&self) -> Result<()> {
        self.validate_at(true)
    }

    fn validate_at(&self, is_root: bool) -> Result<()> {
        match self {
            TreeNode::Terminal { .. } => Ok(()),
            TreeNode::Chance { name, branches, .. } => {
                if branches.is_empty() {
                    return Err(StructuralError::NoTerminal(name.clone()).into());
                }
                branches.iter().try_for_each(|b| b.node.validate_at(false))
            }
            TreeNode::Decision { name, options } => {
                if !is_root {
                    return Err(StructuralError::NestedDecision(name.clone()).into());
                }
                if options.is_empty() {
                    return Err(StructuralError::NoTerminal(name.clone()).into());
                }
                let mut seen = Vec::with_capacity(options.len());
                for option in options {
                    if seen.contains(&option.name()) {
                        return Err(ValidationError::DuplicateName {
                            kind: "option",
                            name: option.name().to_string(),
                        }
                        .into());
                    }
                    seen.push(option.name());
                    option.validate_at(false)?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Flat form
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Decision,
    Chance,
    Terminal,
}

/// One row of a flat tree listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    pub id: NodeId,
    #[serde(default, alias = "parent_id", alias = "parentId")]
    pub parent: Option<NodeId>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    /// Probability of the edge from the parent; required under chance nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Value>,
}

/// Assemble the nested tree from a flat listing.
pub fn build_tree(nodes: &[FlatNode]) -> std::result::Result<TreeNode, StructuralError> {
    let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id, i).is_some() {
            return Err(StructuralError::DuplicateNode(node.id));
        }
    }

    let roots: Vec<NodeId> = nodes
        .iter()
        .filter(|n| n.parent.is_none())
        .map(|n| n.id)
        .collect();
    let root = match roots.as_slice() {
        [] => return Err(StructuralError::MissingRoot),
        [root] => index[root],
        _ => return Err(StructuralError::MultipleRoots(roots)),
    };

    let mut children: FxHashMap<NodeId, Vec<usize>> = FxHashMap::default();
    for (i, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent {
            if !index.contains_key(&parent) {
                return Err(StructuralError::OrphanNode {
                    node: node.id,
                    parent,
                });
            }
            children.entry(parent).or_default().push(i);
        }
    }

    // With a single root and no dangling parents, any node whose parent chain
    // does not end at the root within n steps sits on a cycle.
    for node in nodes {
        let mut current = node;
        let mut steps = 0;
        while let Some(parent) = current.parent {
            steps += 1;
            if steps > nodes.len() {
                return Err(StructuralError::Cycle(node.id));
            }
            current = &nodes[index[&parent]];
        }
    }

    build_subtree(nodes, &children, root, true)
}

fn build_subtree(
    nodes: &[FlatNode],
    children: &FxHashMap<NodeId, Vec<usize>>,
    at: usize,
    is_root: bool,
) -> std::result::Result<TreeNode, StructuralError> {
    let node = &nodes[at];
    let kids = children.get(&node.id).map(Vec::as_slice).unwrap_or_default();
    let cost = node.cost.clone().unwrap_or_else(zero);

    match node.kind {
        NodeKind::Terminal => {
            if !kids.is_empty() {
                return Err(StructuralError::TerminalWithChildren(node.name.clone()));
            }
            Ok(TreeNode::Terminal {
                name: node.name.clone(),
                cost,
                effect: node.effect.clone().unwrap_or_else(zero),
            })
        }
        NodeKind::Decision => {
            if !is_root {
                return Err(StructuralError::NestedDecision(node.name.clone()));
            }
            if kids.is_empty() {
                return Err(StructuralError::NoTerminal(node.name.clone()));
            }
            let options = kids
                .iter()
                .map(|&k| build_subtree(nodes, children, k, false))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(TreeNode::Decision {
                name: node.name.clone(),
                options,
            })
        }
        NodeKind::Chance => {
            if kids.is_empty() {
                return Err(StructuralError::NoTerminal(node.name.clone()));
            }
            let mut branches = Vec::with_capacity(kids.len());
            for &k in kids {
                let child = &nodes[k];
                let probability = child
                    .probability
                    .clone()
                    .ok_or_else(|| StructuralError::MissingProbability(child.name.clone()))?;
                branches.push(Branch {
                    probability,
                    node: build_subtree(nodes, children, k, false)?,
                });
            }
            Ok(TreeNode::Chance {
                name: node.name.clone(),
                cost,
                branches,
            })
        }
    }
}

// ============================================================================
// Tree model
// ============================================================================

/// Spread a one-off tree result over a number of years
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annuity {
    pub years: f64,
}

/// A validated decision tree with optional annuitisation of its results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DecisionTreeRepr", into = "DecisionTreeRepr")]
pub struct DecisionTree {
    root: TreeNode,
    annuity: Option<Annuity>,
    discount: DiscountRates,
}

impl DecisionTree {
    pub fn new(root: TreeNode) -> Result<Self> {
        root.validate_structure()?;
        Ok(Self {
            root,
            annuity: None,
            discount: DiscountRates::default(),
        })
    }

    pub fn from_flat(nodes: &[FlatNode]) -> Result<Self> {
        Self::new(build_tree(nodes)?)
    }

    #[must_use]
    pub fn with_annuity(mut self, years: f64, discount: DiscountRates) -> Self {
        self.annuity = Some(Annuity { years });
        self.discount = discount;
        self
    }

    #[must_use]
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Names of the strategies this tree yields
    #[must_use]
    pub fn option_names(&self) -> Vec<&str> {
        match &self.root {
            TreeNode::Decision { options, .. } => options.iter().map(TreeNode::name).collect(),
            node => vec![node.name()],
        }
    }

    pub fn evaluate_strategies(&self, params: &ParameterSet) -> Result<Vec<StrategyOutcome>> {
        let mut outcomes = self.root.evaluate_strategies(params)?;
        if self.annuity.is_some() {
            for outcome in &mut outcomes {
                let ce = self.annuitise(outcome.cost_effect());
                outcome.cost = ce.cost;
                outcome.effect = ce.effect;
            }
        }
        Ok(outcomes)
    }

    /// Evaluator for a single option of the root decision.
    pub fn option(&self, name: &str) -> Result<TreeOption<'_>> {
        let node = match &self.root {
            TreeNode::Decision { options, .. } => options.iter().find(|o| o.name() == name),
            node => (node.name() == name).then_some(node),
        };
        node.map(|node| TreeOption { tree: self, node })
            .ok_or_else(|| StructuralError::UnknownOption(name.to_string()).into())
    }

    fn annuitise(&self, ce: CostEffect) -> CostEffect {
        match self.annuity {
            Some(Annuity { years }) => CostEffect::new(
                ce.cost * annuity_factor(self.discount.discount_rate_cost, years),
                ce.effect * annuity_factor(self.discount.discount_rate_outcome, years),
            ),
            None => ce,
        }
    }
}

/// One strategy of a [`DecisionTree`]
#[derive(Debug, Clone, Copy)]
pub struct TreeOption<'a> {
    tree: &'a DecisionTree,
    node: &'a TreeNode,
}

impl CostEffectModel for TreeOption<'_> {
    fn evaluate(&self, params: &ParameterSet) -> Result<CostEffect> {
        Ok(self.tree.annuitise(self.node.evaluate(params)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTreeRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<FlatNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annuity: Option<Annuity>,
    #[serde(flatten)]
    discount: DiscountRates,
}

impl TryFrom<DecisionTreeRepr> for DecisionTree {
    type Error = EngineError;

    fn try_from(repr: DecisionTreeRepr) -> Result<Self> {
        let tree = match (repr.root, repr.nodes) {
            (Some(root), None) => DecisionTree::new(root)?,
            (None, Some(nodes)) => DecisionTree::from_flat(&nodes)?,
            (Some(_), Some(_)) => {
                return Err(EngineError::Config(
                    "decision tree takes either `root` or `nodes`, not both".to_string(),
                ));
            }
            (None, None) => return Err(StructuralError::MissingRoot.into()),
        };
        repr.discount.validate()?;
        Ok(DecisionTree {
            annuity: repr.annuity,
            discount: repr.discount,
            ..tree
        })
    }
}

impl From<DecisionTree> for DecisionTreeRepr {
    fn from(tree: DecisionTree) -> Self {
        DecisionTreeRepr {
            root: Some(tree.root),
            nodes: None,
            annuity: tree.annuity,
            discount: tree.discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;

    fn flat(id: NodeId, parent: Option<NodeId>, kind: NodeKind, name: &str) -> FlatNode {
        FlatNode {
            id,
            parent,
            kind,
            name: name.to_string(),
            probability: None,
            cost: None,
            effect: None,
        }
    }

    fn leaf(id: NodeId, parent: NodeId, p: f64, cost: f64, effect: f64) -> FlatNode {
        FlatNode {
            probability: Some(Value::Fixed(p)),
            cost: Some(Value::Fixed(cost)),
            effect: Some(Value::Fixed(effect)),
            ..flat(id, Some(parent), NodeKind::Terminal, &format!("leaf{id}"))
        }
    }

    #[test]
    fn test_decision_yields_one_outcome_per_option() {
        let tree = TreeNode::decision(
            "choose",
            vec![
                TreeNode::terminal("watch", 100.0, 0.6),
                TreeNode::chance(
                    "treat",
                    500.0,
                    vec![
                        Branch::new(0.8, TreeNode::terminal("cured", 0.0, 0.9)),
                        Branch::new("#", TreeNode::terminal("failed", 200.0, 0.4)),
                    ],
                ),
            ],
        );
        let outcomes = tree.evaluate_strategies(&ParameterSet::default()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], StrategyOutcome::new("watch", 100.0, 0.6));
        assert_eq!(outcomes[1].name, "treat");
        assert!((outcomes[1].cost - 540.0).abs() < 1e-9);
        assert!((outcomes[1].effect - 0.8).abs() < 1e-9);

        assert!(matches!(
            tree.evaluate(&ParameterSet::default()),
            Err(EngineError::Structural(StructuralError::DecisionNotReducible(_)))
        ));
    }

    #[test]
    fn test_parameters_flow_into_branches() {
        let params = ParameterSet::new(vec![
            Parameter::probability("p_cure", 0.8),
            Parameter::cost("c_fail", 200.0),
        ])
        .unwrap();
        let node = TreeNode::chance(
            "treat",
            0.0,
            vec![
                Branch::new("p_cure", TreeNode::terminal("cured", 0.0, 1.0)),
                Branch::new(Value::complement("p_cure"), TreeNode::terminal("failed", "c_fail", 0.0)),
            ],
        );
        let base = node.evaluate(&params).unwrap();
        assert!((base.effect - 0.8).abs() < 1e-12);
        assert!((base.cost - 40.0).abs() < 1e-9);

        let varied = node.evaluate(&params.with_value("p_cure", 0.5).unwrap()).unwrap();
        assert!((varied.cost - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_cost_rejected() {
        let node = TreeNode::terminal("leaf", -5.0, 1.0);
        assert!(matches!(
            node.evaluate(&ParameterSet::default()),
            Err(EngineError::Validation(ValidationError::NegativeCost { .. }))
        ));
    }

    #[test]
    fn test_nested_decision_rejected() {
        let tree = TreeNode::decision(
            "outer",
            vec![TreeNode::decision(
                "inner",
                vec![TreeNode::terminal("x", 0.0, 0.0)],
            )],
        );
        assert!(matches!(
            DecisionTree::new(tree),
            Err(EngineError::Structural(StructuralError::NestedDecision(name))) if name == "inner"
        ));
    }

    #[test]
    fn test_build_from_flat() {
        let mut nodes = vec![
            flat(0, None, NodeKind::Decision, "choose"),
            flat(1, Some(0), NodeKind::Chance, "treat"),
            leaf(2, 1, 0.3, 100.0, 0.5),
            leaf(3, 1, 0.7, 200.0, 0.8),
            leaf(4, 0, 1.0, 50.0, 0.4),
        ];
        nodes[1].cost = Some(Value::Fixed(10.0));
        let tree = DecisionTree::from_flat(&nodes).unwrap();
        assert_eq!(tree.option_names(), vec!["treat", "leaf4"]);

        let outcomes = tree.evaluate_strategies(&ParameterSet::default()).unwrap();
        assert!((outcomes[0].cost - 180.0).abs() < 1e-9);
        assert!((outcomes[0].effect - 0.71).abs() < 1e-9);
        assert!((outcomes[1].cost - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_structural_errors() {
        let root = || flat(0, None, NodeKind::Chance, "root");

        assert_eq!(build_tree(&[]), Err(StructuralError::MissingRoot));
        assert_eq!(
            build_tree(&[root(), flat(1, None, NodeKind::Terminal, "x")]),
            Err(StructuralError::MultipleRoots(vec![0, 1]))
        );
        assert_eq!(
            build_tree(&[root(), leaf(0, 0, 1.0, 0.0, 0.0)]),
            Err(StructuralError::DuplicateNode(0))
        );
        assert_eq!(
            build_tree(&[root(), leaf(1, 9, 1.0, 0.0, 0.0)]),
            Err(StructuralError::OrphanNode { node: 1, parent: 9 })
        );
        assert!(matches!(
            build_tree(&[root(), leaf(1, 0, 1.0, 0.0, 0.0), leaf(2, 3, 1.0, 0.0, 0.0), leaf(3, 2, 1.0, 0.0, 0.0)]),
            Err(StructuralError::Cycle(_))
        ));
        assert_eq!(
            build_tree(&[root()]),
            Err(StructuralError::NoTerminal("root".to_string()))
        );
        assert_eq!(
            build_tree(&[root(), leaf(1, 0, 1.0, 0.0, 0.0), leaf(2, 1, 1.0, 0.0, 0.0)]),
            Err(StructuralError::TerminalWithChildren("leaf1".to_string()))
        );
        assert_eq!(
            build_tree(&[root(), flat(1, Some(0), NodeKind::Terminal, "nop")]),
            Err(StructuralError::MissingProbability("nop".to_string()))
        );
    }

    #[test]
    fn test_annuity_scales_results() {
        let tree = DecisionTree::new(TreeNode::terminal("only", 100.0, 1.0))
            .unwrap()
            .with_annuity(10.0, DiscountRates::new(0.0, 0.03));
        let outcomes = tree.evaluate_strategies(&ParameterSet::default()).unwrap();
        assert!((outcomes[0].cost - 1000.0).abs() < 1e-9);
        assert!((outcomes[0].effect - annuity_factor(0.03, 10.0)).abs() < 1e-12);

        let option = tree.option("only").unwrap();
        assert_eq!(
            option.evaluate(&ParameterSet::default()).unwrap().cost,
            outcomes[0].cost
        );
        assert!(tree.option("missing").is_err());
    }

    #[test]
    fn test_deserialize_nested_and_flat() {
        let nested: DecisionTree = serde_json::from_str(
            r##"{"root": {"type": "chance", "name": "c", "branches": [
                {"probability": 0.5, "node": {"type": "terminal", "name": "a", "cost": 1.0, "effect": 1.0}},
                {"probability": "#", "node": {"type": "terminal", "name": "b"}}
            ]}}"##,
        )
        .unwrap();
        assert_eq!(nested.option_names(), vec!["c"]);

        let flat: DecisionTree = serde_json::from_str(
            r#"{"nodes": [
                {"id": 1, "type": "decision", "name": "d"},
                {"id": 2, "parent_id": 1, "type": "terminal", "name": "a", "cost": 5, "effect": 0.5}
            ], "annuity": {"years": 2}, "discountRateCost": 0.0, "discountRateOutcome": 0.0}"#,
        )
        .unwrap();
        let outcomes = flat.evaluate_strategies(&ParameterSet::default()).unwrap();
        assert_eq!(outcomes, vec![StrategyOutcome::new("a", 10.0, 1.0)]);

        assert!(serde_json::from_str::<DecisionTree>("{}").is_err());
    }
}
