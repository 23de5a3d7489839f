//! The `metadata.json` entry that describes a board archive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cb_core::models::BoardType;

/// Name of the metadata entry at the archive root.
pub const METADATA_ENTRY: &str = "metadata.json";
/// Namespace of the attachment entries.
pub const FILES_PREFIX: &str = "files/uploads";
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    /// Board tag the archive was exported from; restores into any other
    /// board are refused.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    pub post_count: usize,
    pub posts: Vec<ArchivedPost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub is_notice: bool,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<ArchivedAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedAttachment {
    pub file_name: String,
    /// Entry path inside the archive
    pub backup_path: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub mime_type: String,
}

/// Makes a file name safe to use as one archive path segment.
pub fn sanitize_entry_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "file".to_owned(),
        name => name.to_owned(),
    }
}

/// Download name of a board archive, e.g. `gallery_backup_2024-05-01.zip`.
pub fn archive_file_name(board: &BoardType, date: NaiveDate) -> String {
    format!("{}_backup_{}.zip", board.as_str().to_ascii_lowercase(), date.format("%Y-%m-%d"))
}
