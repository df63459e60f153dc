//! Rendering analysis results for stdout.

use clap::ValueEnum;
use color_eyre::eyre::eyre;
use hecon_core::store::AnalysisRecord;
use jiff::Timestamp;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

/// One analysis result with the context needed to file it
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub study: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub generated_at: Timestamp,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

impl Report {
    pub fn new(study: impl Into<String>, record: AnalysisRecord) -> Self {
        Self {
            study: study.into(),
            project: None,
            generated_at: Timestamp::now(),
            record,
        }
    }

    #[must_use]
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    pub fn render(&self, format: OutputFormat) -> color_eyre::Result<String> {
        let text = match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
            OutputFormat::Yaml => serde_saphyr::to_string(self)
                .map_err(|e| eyre!("Failed to serialize report: {e}"))?,
        };
        Ok(text)
    }
}
