//! Archive-level failures. Any of these aborts an export or a restore
//! before (restore) or instead of (export) touching board data.

use thiserror::Error;
use zip::result::ZipError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive has no metadata.json entry")]
    MissingMetadata,

    #[error("invalid archive metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("archive holds {found} data, expected {expected}")]
    TypeMismatch { expected: String, found: String },

    #[error("not a readable archive: {0}")]
    Zip(#[from] ZipError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}
