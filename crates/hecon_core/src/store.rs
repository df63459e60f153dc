//! Persistence interface.
//!
//! The engine owns no storage. Hosts implement [`ProjectStore`] to hand it
//! parameter sets and to keep whatever it returns.

use serde::{Deserialize, Serialize};

use crate::analysis::{IncrementalAnalysis, PsaSummary, TornadoResult};
use crate::model::{ParameterSet, StrategyOutcome};

/// Any result an analysis call returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisRecord {
    BaseCase {
        strategies: Vec<StrategyOutcome>,
        incremental: IncrementalAnalysis,
    },
    Dsa(TornadoResult),
    Psa(PsaSummary),
}

impl AnalysisRecord {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRecord::BaseCase { .. } => "base_case",
            AnalysisRecord::Dsa(_) => "dsa",
            AnalysisRecord::Psa(_) => "psa",
        }
    }
}

pub trait ProjectStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load_parameters(&self, project_id: &str) -> Result<ParameterSet, Self::Error>;

    fn save_result(&self, project_id: &str, record: &AnalysisRecord) -> Result<(), Self::Error>;
}
