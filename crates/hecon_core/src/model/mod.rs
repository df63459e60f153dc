mod distribution;
mod outcome;
mod parameters;

pub use distribution::Distribution;
pub use outcome::{
    CostEffect, EFFECT_TIE_TOLERANCE, Icer, StrategyOutcome, net_monetary_benefit, signed_float,
};
pub use parameters::{
    Parameter, ParameterCategory, ParameterSet, REMAINDER_MARKER, Value, resolve_probability_row,
};

/// Identifier of a node in a flat decision-tree listing
pub type NodeId = u32;

/// Allowed deviation from 1 for any probability row or branch set
pub const PROBABILITY_TOLERANCE: f64 = 0.01;
