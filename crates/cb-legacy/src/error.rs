//! Errors that abort a migration run.
//!
//! Problems with single rows are not errors at this level: they are logged,
//! counted in the run's statistics, and skipped.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("dump file not found: {}", .0.display())]
    DumpNotFound(PathBuf),

    #[error("failed reading dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}
