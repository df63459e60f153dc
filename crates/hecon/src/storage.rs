//! Per-project file storage
//!
//! Directory structure:
//! {data_dir}/
//!   projects/
//!     {project}/
//!       parameters.yaml
//!       results/
//!         psa-20260101T120000Z.yaml
//!         dsa-20260101T120512Z.yaml

use std::fs;
use std::path::{Path, PathBuf};

use hecon_core::model::ParameterSet;
use hecon_core::store::{AnalysisRecord, ProjectStore};
use jiff::Timestamp;

/// Error types for storage operations
#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Parse(String),
    Serialize(String),
    NotFound(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "IO error: {msg}"),
            StorageError::Parse(msg) => write!(f, "Parse error: {msg}"),
            StorageError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
            StorageError::NotFound(project) => write!(f, "No parameters stored for project '{project}'"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Project store backed by a directory of YAML files
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join("projects").join(sanitize_filename(project_id))
    }

    fn parameters_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("parameters.yaml")
    }

    fn results_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("results")
    }

    /// Store a parameter set as the project's current inputs
    pub fn save_parameters(
        &self,
        project_id: &str,
        parameters: &ParameterSet,
    ) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(self.project_dir(project_id))
            .map_err(|e| StorageError::Io(format!("Failed to create project directory: {e}")))?;

        let yaml = serde_saphyr::to_string(parameters)
            .map_err(|e| StorageError::Serialize(format!("Failed to serialize parameters: {e}")))?;

        let path = self.parameters_path(project_id);
        fs::write(&path, yaml)
            .map_err(|e| StorageError::Io(format!("Failed to write parameters: {e}")))?;
        Ok(path)
    }

    /// Result files of a project, oldest first
    pub fn list_results(&self, project_id: &str) -> Result<Vec<PathBuf>, StorageError> {
        let dir = self.results_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| StorageError::Io(format!("Failed to read results directory: {e}")))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    pub fn load_result(&self, path: &Path) -> Result<AnalysisRecord, StorageError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("Failed to read result: {e}")))?;
        serde_saphyr::from_str(&content)
            .map_err(|e| StorageError::Parse(format!("Failed to parse result: {e}")))
    }

    /// Next free result path for `kind`, stamped with the current UTC time
    fn result_path(&self, project_id: &str, kind: &str) -> PathBuf {
        let dir = self.results_dir(project_id);
        let stamp = Timestamp::now().strftime("%Y%m%dT%H%M%SZ").to_string();
        let mut path = dir.join(format!("{kind}-{stamp}.yaml"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{kind}-{stamp}-{n}.yaml"));
            n += 1;
        }
        path
    }
}

impl ProjectStore for DirectoryStore {
    type Error = StorageError;

    fn load_parameters(&self, project_id: &str) -> Result<ParameterSet, StorageError> {
        let path = self.parameters_path(project_id);
        if !path.exists() {
            return Err(StorageError::NotFound(project_id.to_string()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read parameters: {e}")))?;
        serde_saphyr::from_str(&content)
            .map_err(|e| StorageError::Parse(format!("Failed to parse parameters: {e}")))
    }

    fn save_result(&self, project_id: &str, record: &AnalysisRecord) -> Result<(), StorageError> {
        fs::create_dir_all(self.results_dir(project_id))
            .map_err(|e| StorageError::Io(format!("Failed to create results directory: {e}")))?;

        let yaml = serde_saphyr::to_string(record)
            .map_err(|e| StorageError::Serialize(format!("Failed to serialize result: {e}")))?;

        let path = self.result_path(project_id, record.kind());
        fs::write(&path, yaml)
            .map_err(|e| StorageError::Io(format!("Failed to write result: {e}")))?;
        tracing::debug!(project = project_id, path = %path.display(), "saved result");
        Ok(())
    }
}

/// Sanitize a filename to be safe for the filesystem
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
