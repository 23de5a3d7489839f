//! # cb-legacy
//!
//! One-shot migration of the predecessor site's board data. A SQL dump is
//! streamed line by line, the `INSERT` statements of the post and
//! attachment tables are tokenized, rows of one legacy board are kept, and
//! the result is written into a destination board through `BoardRepo`.

pub mod columns;
pub mod dump;
pub mod error;
pub mod importer;
pub mod timestamp;
pub mod tokenizer;

pub use columns::{LegacyAttachmentRow, LegacyPostRow, ATTACHMENT_COLUMNS, POST_COLUMNS};
pub use dump::{DumpExtract, DumpFilter, DumpTables, ExtractStats};
pub use error::LegacyError;
pub use importer::{ImportOptions, ImportReport, LegacyImporter};
pub use tokenizer::{tokenize_values, TokenizeError};
