//! Analyses over evaluated strategies.
//!
//! - [`analyze`] ranks a strategy set and removes dominated options.
//! - [`run_dsa`] varies one parameter at a time and ranks parameters by ICER
//!   swing (tornado order).
//! - [`run_psa`] resamples distributed parameters and summarises the draws,
//!   including the cost-effectiveness acceptability curve.
//!
//! DSA and PSA take any [`CostEffectModel`](crate::evaluate::CostEffectModel)
//! and read its output as an increment, so the usual input is a
//! [`Comparison`](crate::evaluate::Comparison):
//!
//! ```ignore
//! use hecon_core::analysis::{PsaConfig, run_psa};
//! use hecon_core::evaluate::Comparison;
//!
//! let comparison = Comparison::new(&new_drug, &usual_care);
//! let config = PsaConfig::default().with_seed(42);
//! let summary = run_psa(&params, &comparison, &config, 50_000.0, None)?;
//! println!("P(cost-effective) = {}", summary.probability_cost_effective);
//! ```

mod config;
mod dsa;
mod incremental;
mod progress;
mod psa;
pub mod stats;

pub use config::*;
pub use dsa::*;
pub use incremental::*;
pub use progress::*;
pub use psa::*;
