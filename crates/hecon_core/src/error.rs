use thiserror::Error;

use crate::model::NodeId;

/// Input that violates a numeric or domain invariant.
///
/// Raised at the point of detection and never corrected silently. Each variant
/// names the offending entity so the caller can localize the bad record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("probabilities for {entity} sum to {sum} (expected 1 within {tolerance})")]
    ProbabilitySum {
        entity: String,
        sum: f64,
        tolerance: f64,
    },
    #[error("{entity} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        entity: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{entity} has negative cost {value}")]
    NegativeCost { entity: String, value: f64 },
    #[error("{entity} is not a finite number ({value})")]
    NonFinite { entity: String, value: f64 },
    #[error("{entity} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        entity: String,
        expected: usize,
        found: usize,
    },
    #[error("overall survival {os} is below progression-free survival {pfs} at t = {time}")]
    SurvivalCrossing { time: f64, pfs: f64, os: f64 },
    #[error("invalid {family} survival curve: {reason}")]
    InvalidSurvivalCurve {
        family: &'static str,
        reason: String,
    },
    #[error("invalid {kind} distribution for {entity}: {reason}")]
    InvalidDistribution {
        entity: String,
        kind: &'static str,
        reason: String,
    },
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("remainder marker misused in {entity}: {reason}")]
    MisplacedRemainder {
        entity: String,
        reason: &'static str,
    },
    #[error("invalid setting {name} = {value}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Malformed decision-tree topology or a frontier walk that cannot settle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("tree has no root node")]
    MissingRoot,
    #[error("tree has several root nodes: {0:?}")]
    MultipleRoots(Vec<NodeId>),
    #[error("node id {0} appears more than once")]
    DuplicateNode(NodeId),
    #[error("node {node} references unknown parent {parent}")]
    OrphanNode { node: NodeId, parent: NodeId },
    #[error("parent links starting at node {0} form a cycle")]
    Cycle(NodeId),
    #[error("node '{0}' has no branches, so no terminal is reachable")]
    NoTerminal(String),
    #[error("terminal node '{0}' cannot have children")]
    TerminalWithChildren(String),
    #[error("decision node '{0}' is only allowed at the root")]
    NestedDecision(String),
    #[error("decision node '{0}' evaluates to one outcome per option, not a single outcome")]
    DecisionNotReducible(String),
    #[error("branch '{0}' under a chance node has no probability")]
    MissingProbability(String),
    #[error("tree has no option named '{0}'")]
    UnknownOption(String),
    #[error("no strategy named '{0}'")]
    UnknownStrategy(String),
    #[error("extended dominance did not settle within {0} passes")]
    DominanceNonTermination(usize),
}

/// Internal invariant broken during a computation that passed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    #[error("cohort occupancy sums to {sum} after cycle {cycle}")]
    ProbabilityMassDrift { cycle: usize, sum: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    /// Run aborted by the caller between iterations
    #[error("analysis cancelled after {completed} of {requested} evaluations")]
    Cancelled { completed: usize, requested: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
