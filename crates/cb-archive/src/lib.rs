//! # cb-archive
//!
//! Portable board archives: a zip holding `metadata.json` plus the
//! attachment files under `files/uploads/<post id>/`. Exports stream into
//! any seekable sink; restores validate the archive first, then insert post
//! by post under a per-board lock.

pub mod error;
pub mod export;
pub mod lock;
pub mod metadata;
pub mod reader;
pub mod restore;

pub use error::ArchiveError;
pub use export::{export_board, ExportSummary};
pub use lock::BoardLocks;
pub use metadata::{archive_file_name, ArchiveMetadata, ArchivedAttachment, ArchivedPost};
pub use reader::{open_archive, OpenedArchive};
pub use restore::{BoardRestorer, RestoreMode, RestoreOptions, RestoreReport};
