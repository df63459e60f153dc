//! Health-economic evaluation engine
//!
//! This crate turns model structures and parameter sets into expected costs
//! and health effects, and quantifies how robust the resulting
//! cost-effectiveness conclusions are. It supports:
//! - Decision trees (decision, chance and terminal nodes)
//! - Markov cohort models with half-cycle corrected discounting
//! - Partitioned survival models over Weibull, exponential, log-normal and
//!   Gompertz curves
//! - Incremental analysis with strict and extended dominance
//! - One-way sensitivity analysis (tornado ranking)
//! - Probabilistic sensitivity analysis with acceptability curves
//!
//! # Example
//!
//! ```ignore
//! use hecon_core::evaluate::{Comparison, MarkovModel};
//! use hecon_core::analysis::{PsaConfig, run_psa};
//!
//! let comparison = Comparison::new(&new_drug, &usual_care);
//! let base = comparison.evaluate_arms(&params)?;
//! let summary = run_psa(&params, &comparison, &PsaConfig::default().with_seed(7), 50_000.0, None)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod discount;
pub mod error;
pub mod evaluate;
pub mod survival;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;
pub mod store;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::Study;
pub use error::{EngineError, Result};
pub use evaluate::{Comparison, CostEffectModel};
pub use model::{CostEffect, Parameter, ParameterSet, StrategyOutcome};
