//! Command-line front end for the hecon evaluation engine.
//!
//! Loads a study file, runs the requested analysis, prints a report, and
//! optionally files inputs and results under a project directory.

pub mod commands;
pub mod logging;
pub mod report;
pub mod storage;

pub use commands::{Analysis, RunOptions, execute};
pub use logging::init_logging;
pub use report::{OutputFormat, Report};
pub use storage::DirectoryStore;
