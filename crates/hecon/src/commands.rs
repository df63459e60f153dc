//! Study loading and analysis dispatch behind the CLI subcommands.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{WrapErr, eyre};
use hecon_core::analysis::{RunProgress, analyze};
use hecon_core::config::{ModelStructure, Study};
use hecon_core::store::{AnalysisRecord, ProjectStore};
use serde::Serialize;

use crate::report::Report;
use crate::storage::{DirectoryStore, StorageError};

/// How often a long run logs its progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    BaseCase,
    Dsa,
    Psa,
}

/// Command-line overrides applied on top of a study file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub project: Option<String>,
    pub wtp: Option<f64>,
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub timeout: Option<Duration>,
}

/// What `hecon validate` prints
#[derive(Debug, Clone, Serialize)]
pub struct StudySummary {
    pub name: String,
    pub model: &'static str,
    pub strategies: Vec<String>,
    pub parameters: usize,
    /// Parameters PSA will resample
    pub distributed: Vec<String>,
    pub wtp_threshold: f64,
    /// (intervention, comparator) used by DSA and PSA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<(String, String)>,
}

pub fn load_study(path: &Path) -> color_eyre::Result<Study> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read study file {}", path.display()))?;
    serde_saphyr::from_str(&content)
        .map_err(|e| eyre!("Failed to parse study file {}: {e}", path.display()))
}

pub fn model_kind(model: &ModelStructure) -> &'static str {
    match model {
        ModelStructure::DecisionTree { .. } => "decision_tree",
        ModelStructure::Markov { .. } => "markov",
        ModelStructure::PartitionedSurvival { .. } => "partitioned_survival",
    }
}

pub fn apply_overrides(study: &mut Study, options: &RunOptions) {
    if let Some(wtp) = options.wtp {
        study.settings.wtp_threshold = wtp;
    }
    if let Some(iterations) = options.iterations {
        study.settings.psa.iterations = iterations;
    }
    if let Some(seed) = options.seed {
        study.settings.psa.seed = Some(seed);
    }
}

pub fn summarize_study(study: &Study) -> color_eyre::Result<StudySummary> {
    study.validate().wrap_err("Study failed validation")?;
    let strategies: Vec<String> = study
        .model
        .strategy_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let comparison = if strategies.len() > 1 {
        Some(study.comparison_names()?)
    } else {
        None
    };
    Ok(StudySummary {
        name: study.name.clone(),
        model: model_kind(&study.model),
        strategies,
        parameters: study.parameters.len(),
        distributed: study
            .parameters
            .iter()
            .filter(|p| p.distribution.is_some())
            .map(|p| p.name.clone())
            .collect(),
        wtp_threshold: study.settings.wtp_threshold,
        comparison,
    })
}

/// Swap in the project's stored parameters, or seed the project with the
/// study's own parameters the first time it is used.
pub fn attach_project(
    study: &mut Study,
    store: &DirectoryStore,
    project: &str,
) -> color_eyre::Result<()> {
    match store.load_parameters(project) {
        Ok(parameters) => {
            tracing::info!(
                project,
                parameters = parameters.len(),
                "using stored project parameters"
            );
            study.parameters = parameters;
        }
        Err(StorageError::NotFound(_)) => {
            let path = store.save_parameters(project, &study.parameters)?;
            tracing::info!(project, path = %path.display(), "created project from study parameters");
        }
        Err(e) => return Err(e).wrap_err_with(|| format!("Failed to load project '{project}'")),
    }
    Ok(())
}

/// Run one analysis, logging progress of long runs from a watcher thread.
pub fn run_analysis(
    study: &Study,
    analysis: Analysis,
    timeout: Option<Duration>,
) -> color_eyre::Result<AnalysisRecord> {
    study.validate().wrap_err("Study failed validation")?;

    let progress = match timeout {
        Some(timeout) => RunProgress::default().with_timeout(timeout),
        None => RunProgress::default(),
    };
    let done = AtomicBool::new(false);

    let record = thread::scope(|scope| {
        if analysis != Analysis::BaseCase {
            scope.spawn(|| watch_progress(&progress, &done));
        }
        let record = evaluate_record(study, analysis, &progress);
        done.store(true, Ordering::Relaxed);
        record
    });

    record.wrap_err_with(|| format!("{analysis:?} analysis of '{}' failed", study.name))
}

fn evaluate_record(
    study: &Study,
    analysis: Analysis,
    progress: &RunProgress,
) -> hecon_core::Result<AnalysisRecord> {
    Ok(match analysis {
        Analysis::BaseCase => {
            let strategies = study.evaluate()?;
            let incremental = analyze(&strategies, study.settings.wtp_threshold)?;
            AnalysisRecord::BaseCase {
                strategies,
                incremental,
            }
        }
        Analysis::Dsa => AnalysisRecord::Dsa(study.run_dsa(Some(progress))?),
        Analysis::Psa => AnalysisRecord::Psa(study.run_psa(Some(progress))?),
    })
}

fn watch_progress(progress: &RunProgress, done: &AtomicBool) {
    let mut waited = Duration::ZERO;
    let tick = Duration::from_millis(50);
    while !done.load(Ordering::Relaxed) {
        thread::sleep(tick);
        waited += tick;
        if waited >= PROGRESS_INTERVAL {
            waited = Duration::ZERO;
            tracing::info!(
                completed = progress.completed(),
                total = progress.total(),
                "analysis in progress"
            );
        }
    }
}

/// Load a study, apply overrides, run the analysis, and file the result
/// with the project store when a project is named.
pub fn execute(
    study_path: &Path,
    analysis: Analysis,
    options: &RunOptions,
    data_dir: &Path,
) -> color_eyre::Result<Report> {
    let mut study = load_study(study_path)?;
    apply_overrides(&mut study, options);

    let store = options
        .project
        .as_ref()
        .map(|_| DirectoryStore::new(data_dir.to_path_buf()));
    if let (Some(store), Some(project)) = (&store, &options.project) {
        attach_project(&mut study, store, project)?;
    }

    tracing::info!(study = %study.name, ?analysis, "running analysis");
    let record = run_analysis(&study, analysis, options.timeout)?;

    if let (Some(store), Some(project)) = (&store, &options.project) {
        store
            .save_result(project, &record)
            .wrap_err_with(|| format!("Failed to save result for project '{project}'"))?;
    }

    Ok(Report::new(study.name, record).with_project(options.project.clone()))
}

/// Default data directory (~/.hecon/)
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hecon")
}
